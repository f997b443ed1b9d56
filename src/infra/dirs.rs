//! Platform-specific directory management
//!
//! Provides paths for the settings file and the durable data directory.
//! Follows XDG Base Directory Specification on Linux.
//!
//! Environment variables can override default directories:
//! - `CMPROVISION_CONFIG_DIR` - Override config directory
//! - `CMPROVISION_DATA_DIR` - Override data directory

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults::{PROJECTS_FILE, RESULTS_FILE, UPLOADS_DIR};

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "CMPROVISION_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "CMPROVISION_DATA_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "cmprovision";

/// Settings file name
const SETTINGS_FILE: &str = "cmprovision.toml";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct ProvisionDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ProvisionDirs {
    /// Create a new `ProvisionDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
            data_dir: Self::resolve_data_dir(),
        }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/cmprovision` or `~/.config/cmprovision`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the data directory path
    ///
    /// Holds the project catalog, session results and uploads.
    /// - Linux: `$XDG_DATA_HOME/cmprovision` or `~/.local/share/cmprovision`
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Get the settings file path
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }

    fn resolve_data_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_DATA_DIR) {
            return PathBuf::from(path);
        }

        dirs::data_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".local").join("share").join(APP_NAME))
                    .unwrap_or_else(|| {
                        PathBuf::from(".")
                            .join(".local")
                            .join("share")
                            .join(APP_NAME)
                    })
            })
    }
}

impl Default for ProvisionDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout of the files inside a data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project catalog document
    pub fn projects_path(&self) -> PathBuf {
        self.root.join(PROJECTS_FILE)
    }

    /// Session results document
    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// Uploaded images and firmware
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_new_creates_instance() {
        let dirs = ProvisionDirs::new();
        assert!(!dirs.config_dir().as_os_str().is_empty());
        assert!(!dirs.data_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_settings_path_is_under_config_dir() {
        let dirs = ProvisionDirs::new();
        assert!(dirs.settings_path().starts_with(dirs.config_dir()));
        assert!(dirs.settings_path().ends_with("cmprovision.toml"));
    }

    #[test]
    fn test_layout_paths_are_under_root() {
        let layout = DataLayout::new("/var/lib/cmprovision");
        assert_eq!(
            layout.projects_path(),
            PathBuf::from("/var/lib/cmprovision/projects.json")
        );
        assert_eq!(
            layout.results_path(),
            PathBuf::from("/var/lib/cmprovision/results.json")
        );
        assert!(layout.uploads_dir().starts_with(layout.root()));
    }
}
