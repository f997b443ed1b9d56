//! Project records
//!
//! A project names the image variants (one per flash-capacity tier) and the
//! optional bootloader firmware that booting devices receive while the
//! project is active.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Sentinel for "no status LED"
pub const NO_STATUS_LED: i32 = -1;

fn no_status_led() -> i32 {
    NO_STATUS_LED
}

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").ok())
        .as_ref()
}

/// Flash-capacity bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTier {
    /// Up to 8 GiB
    Small,
    /// Above 8 GiB, up to 16 GiB
    Medium,
    /// Above 16 GiB
    Large,
}

/// Image references per capacity tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTiers {
    /// Image for small devices; also the fallback for unset tiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
}

impl ImageTiers {
    /// Reference configured for exactly this tier
    pub fn get(&self, tier: ImageTier) -> Option<&str> {
        let slot = match tier {
            ImageTier::Small => &self.small,
            ImageTier::Medium => &self.medium,
            ImageTier::Large => &self.large,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    /// Set the reference for a tier
    pub fn set(&mut self, tier: ImageTier, image: impl Into<String>) {
        let slot = match tier {
            ImageTier::Small => &mut self.small,
            ImageTier::Medium => &mut self.medium,
            ImageTier::Large => &mut self.large,
        };
        *slot = Some(image.into());
    }
}

/// A provisioning project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project name
    pub name: String,

    /// Whether this project is served to booting devices
    #[serde(default)]
    pub active: bool,

    /// Image references per capacity tier
    #[serde(default)]
    pub images: ImageTiers,

    /// Bootloader firmware reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,

    /// GPIO of the status LED, `-1` for none
    #[serde(default = "no_status_led")]
    pub status_led_id: i32,

    /// LED polarity
    #[serde(default)]
    pub status_led_active_high: bool,
}

impl Project {
    /// Create an inactive project with no images
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: false,
            images: ImageTiers::default(),
            firmware: None,
            status_led_id: NO_STATUS_LED,
            status_led_active_high: false,
        }
    }

    /// Set the image for a tier
    pub fn with_image(mut self, tier: ImageTier, image: impl Into<String>) -> Self {
        self.images.set(tier, image);
        self
    }

    /// Set the bootloader firmware
    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = Some(firmware.into());
        self
    }

    /// Configure the status LED
    pub fn with_status_led(mut self, id: i32, active_high: bool) -> Self {
        self.status_led_id = id;
        self.status_led_active_high = active_high;
        self
    }

    /// Mark active or inactive
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether a status LED is configured
    pub fn has_status_led(&self) -> bool {
        self.status_led_id >= 0
    }
}

/// Check a project name against the allowed pattern
pub fn validate_project_name(name: &str) -> Result<(), CatalogError> {
    if name_pattern().is_some_and(|re| re.is_match(name)) {
        Ok(())
    } else {
        Err(CatalogError::InvalidName {
            name: name.to_string(),
            reason: "must start with a letter or digit and contain only letters, digits, '.', '_' or '-' (max 64)".to_string(),
        })
    }
}
