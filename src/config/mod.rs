//! Configuration and constants
//!
//! - [`defaults`] - Default values and tuning constants
//! - [`settings`] - Server settings file (`cmprovision.toml`)

pub mod defaults;
pub mod settings;

pub use settings::{BootSettings, ConfigError, ServerSection, Settings, StorageSettings};
