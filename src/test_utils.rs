//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a valid project name
    pub fn project_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9._-]{0,20}"
    }

    /// Generate a device serial (8 hex digits, as reported by compute modules)
    pub fn serial() -> impl Strategy<Value = String> {
        "[0-9a-f]{8}"
    }

    /// Generate a flash size in 512-byte sectors, up to 64 GiB
    pub fn sector_count() -> impl Strategy<Value = u64> {
        0u64..=(64 * (1 << 30) / 512)
    }

    /// Generate a valid SHA256 hash (64 hex characters)
    pub fn sha256_hash() -> impl Strategy<Value = String> {
        "[0-9a-f]{64}"
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::core::project::validate_project_name;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_project_name_generator(name in project_name()) {
            prop_assert!(validate_project_name(&name).is_ok());
        }

        #[test]
        fn test_serial_generator(serial in serial()) {
            prop_assert_eq!(serial.len(), 8);
            prop_assert!(serial.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn test_sha256_hash_generator(hash in sha256_hash()) {
            prop_assert_eq!(hash.len(), 64);
            prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
