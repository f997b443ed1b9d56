//! Server settings
//!
//! Reads `cmprovision.toml`. A missing file yields defaults, so a bare
//! `cmprovision serve` works out of the box on a freshly imaged host.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:80"
//! host_iface = "eth0"
//! server_ip = "172.20.0.1/16"
//! dhcp_range = "172.20.0.2,172.20.255.255,255.255.0.0,6h"
//! manage_interface = true
//!
//! [storage]
//! data_dir = "/var/lib/cmprovision"
//!
//! [boot]
//! enabled = true
//! binary = "dnsmasq"
//! poll_interval_ms = 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::defaults;
use crate::infra::dirs::ProvisionDirs;

/// Settings error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Top-level server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// HTTP and network settings
    #[serde(default)]
    pub server: ServerSection,

    /// Durable storage location
    #[serde(default)]
    pub storage: StorageSettings,

    /// Boot responder supervision
    #[serde(default)]
    pub boot: BootSettings,
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// HTTP bind address
    pub bind: String,

    /// Interface facing the devices
    pub host_iface: String,

    /// Server address in CIDR notation
    pub server_ip: String,

    /// DHCP range handed to the boot responder
    pub dhcp_range: String,

    /// Assign `server_ip` to `host_iface` on startup
    pub manage_interface: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: defaults::DEFAULT_BIND_ADDR.to_string(),
            host_iface: defaults::DEFAULT_HOST_IFACE.to_string(),
            server_ip: defaults::DEFAULT_SERVER_IP.to_string(),
            dhcp_range: defaults::DEFAULT_DHCP_RANGE.to_string(),
            manage_interface: false,
        }
    }
}

impl ServerSection {
    /// Server address without the prefix length, as devices reach it
    pub fn server_host(&self) -> &str {
        self.server_ip.split('/').next().unwrap_or(&self.server_ip)
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    /// Data directory override; falls back to the platform data directory
    pub data_dir: Option<PathBuf>,
}

impl StorageSettings {
    /// Resolve the effective data directory
    pub fn resolve_data_dir(&self, dirs: &ProvisionDirs) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| dirs.data_dir())
    }
}

/// `[boot]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootSettings {
    /// Run the boot responder supervisor
    pub enabled: bool,

    /// Responder executable
    pub binary: String,

    /// Responder configuration file written on start
    pub conf_path: PathBuf,

    /// TFTP root holding the device boot files
    pub tftp_root: PathBuf,

    /// Active-project poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Bounded wait for `stop` in milliseconds
    pub stop_timeout_ms: u64,
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: defaults::DEFAULT_BOOT_BINARY.to_string(),
            conf_path: PathBuf::from(defaults::DEFAULT_BOOT_CONF_PATH),
            tftp_root: PathBuf::from(defaults::DEFAULT_TFTP_ROOT),
            poll_interval_ms: defaults::BOOT_POLL_INTERVAL_MS,
            stop_timeout_ms: defaults::BOOT_STOP_TIMEOUT_MS,
        }
    }
}

impl BootSettings {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Stop timeout as a [`Duration`]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Settings {
    /// Load settings from the default location
    ///
    /// If the file doesn't exist, returns default settings.
    pub fn load(dirs: &ProvisionDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if the file exists but contains
    /// invalid TOML.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Save settings to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError {
                path: parent.display().to_string(),
                error: e.to_string(),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        fs::write(path, content).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from_path(&temp.path().join("nope.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.boot.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cmprovision.toml");
        fs::write(
            &path,
            r#"
[server]
host_iface = "enp3s0"

[boot]
poll_interval_ms = 100
"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(settings.server.host_iface, "enp3s0");
        assert_eq!(settings.server.bind, defaults::DEFAULT_BIND_ADDR);
        assert_eq!(settings.boot.poll_interval_ms, 100);
        assert_eq!(settings.boot.binary, "dnsmasq");
        assert!(settings.storage.data_dir.is_none());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cmprovision.toml");
        fs::write(&path, "[server\nbind = ").unwrap();

        let err = Settings::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("cmprovision.toml");
        let mut settings = Settings::default();
        settings.storage.data_dir = Some(PathBuf::from("/srv/cmprovision"));
        settings.boot.enabled = false;

        settings.save_to_path(&path).unwrap();
        assert_eq!(Settings::load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn test_server_host_strips_prefix() {
        let server = ServerSection::default();
        assert_eq!(server.server_host(), "172.20.0.1");

        let bare = ServerSection {
            server_ip: "10.0.0.1".to_string(),
            ..ServerSection::default()
        };
        assert_eq!(bare.server_host(), "10.0.0.1");
    }
}
