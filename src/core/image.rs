//! Image selection
//!
//! Maps a device's reported flash size onto one of the active project's
//! image tiers. Pure; no catalog access happens here.

use crate::config::defaults::{MEDIUM_TIER_MAX_GIB, SECTOR_SIZE, SMALL_TIER_MAX_GIB};

use super::project::{ImageTier, Project};

/// Convert a sector count into GiB
pub fn capacity_gib(sector_count: u64) -> f64 {
    (sector_count as f64) * (SECTOR_SIZE as f64) / f64::from(1u32 << 30)
}

/// Tier for a capacity in GiB; boundaries are inclusive on the upper side
pub fn tier_for_capacity(gib: f64) -> ImageTier {
    if gib <= SMALL_TIER_MAX_GIB {
        ImageTier::Small
    } else if gib <= MEDIUM_TIER_MAX_GIB {
        ImageTier::Medium
    } else {
        ImageTier::Large
    }
}

/// Select the image a device with `sector_count` sectors should receive
///
/// An unset tier falls back to the small tier. Without an active project the
/// result is empty, which callers must treat as an error.
pub fn select(active: Option<&Project>, sector_count: u64) -> String {
    let Some(project) = active else {
        return String::new();
    };

    let tier = tier_for_capacity(capacity_gib(sector_count));
    project
        .images
        .get(tier)
        .or_else(|| project.images.get(ImageTier::Small))
        .unwrap_or_default()
        .to_string()
}

/// Firmware reference of the active project
pub fn firmware(active: Option<&Project>) -> Option<String> {
    active.and_then(|p| p.firmware.clone()).filter(|f| !f.is_empty())
}
