//! cmprovision - network-boot provisioning server for compute modules
//!
//! Devices boot over the network, fetch a provisioning script, flash their
//! storage and report back over several HTTP calls. This crate tracks each
//! device's provisioning session across those calls, fans session changes out
//! to live observers and runs the boot responder only while a project is
//! active.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Pure domain logic (projects, image selection, sessions, rendering)
//! - [`store`] - Durable project catalog and session store
//! - [`provision`] - Session state machine, live update hub, boot responder gate
//! - [`http`] - axum router and handlers
//! - [`infra`] - Infrastructure layer (filesystem, uploads, host network)
//! - [`config`] - Settings and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod infra;
pub mod provision;
pub mod store;

#[cfg(test)]
pub mod test_utils;
