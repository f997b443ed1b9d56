//! Output formatting
//!
//! Human-readable status lines or JSON for scripting, chosen once from the
//! global flags and applied process-wide.

use std::sync::OnceLock;

use serde::Serialize;

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Global output mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

static GLOBAL: OnceLock<OutputConfig> = OnceLock::new();

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this the process-wide configuration; only the first call wins
    pub fn apply_global(self) {
        let _ = GLOBAL.set(self);
    }

    /// The process-wide configuration
    pub fn current() -> Self {
        GLOBAL.get().copied().unwrap_or_default()
    }
}

/// Print a success line unless quiet or in JSON mode
pub fn success(message: &str) {
    let config = OutputConfig::current();
    if !config.quiet && !config.json {
        println!("{} {message}", status::SUCCESS);
    }
}

/// Print an informational line unless quiet or in JSON mode
pub fn info(message: &str) {
    let config = OutputConfig::current();
    if !config.quiet && !config.json {
        println!("{} {message}", status::INFO);
    }
}

/// Print `value` as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error and its causes to stderr
pub fn display_error(err: &anyhow::Error) {
    if OutputConfig::current().json {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({ "error": err.to_string(), "causes": causes });
        eprintln!("{body}");
        return;
    }

    eprintln!("{} Error: {err}", status::ERROR);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_human_readable() {
        let config = OutputConfig::default();
        assert!(!config.quiet);
        assert!(!config.json);
        assert_eq!(config.verbose, 0);
    }

    #[test]
    fn test_new_keeps_flags() {
        assert_eq!(
            OutputConfig::new(true, true, 2),
            OutputConfig {
                quiet: true,
                json: true,
                verbose: 2
            }
        );
    }
}
