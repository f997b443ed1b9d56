//! Core business logic module
//!
//! This module contains the provisioning domain model and pure logic.
//! It has NO I/O operations - those belong in [`crate::infra`] and
//! [`crate::store`].
//!
//! # Submodules
//!
//! - [`project`] - Project records and name validation
//! - [`image`] - Capacity-tier image selection
//! - [`session`] - Provisioning sessions and their state transitions
//! - [`script`] - Provisioning script rendering
//! - [`boot_config`] - Boot responder configuration rendering

pub mod boot_config;
pub mod image;
pub mod project;
pub mod script;
pub mod session;
