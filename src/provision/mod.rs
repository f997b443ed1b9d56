//! Provisioning orchestration
//!
//! Stateful services built on the durable stores: the session state machine,
//! the live update hub it publishes to, and the boot responder gate.

pub mod boot_gate;
pub mod hub;
pub mod machine;

pub use boot_gate::{BootGate, BootGateConfig, BootStatus, ResponderCommand};
pub use hub::{LiveUpdateHub, SessionUpdate, Subscription, UpdateKind};
pub use machine::{NewSession, Provisioner};
