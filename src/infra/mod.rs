//! Infrastructure layer
//!
//! Handles I/O that is not a durable document: the uploads directory, host
//! network setup, data directory layout and filesystem helpers.

pub mod artifacts;
pub mod dirs;
pub mod filesystem;
pub mod network;
