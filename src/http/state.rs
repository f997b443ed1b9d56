//! Shared handler state

use std::sync::Arc;

use crate::infra::artifacts::ArtifactStore;
use crate::provision::{BootGate, Provisioner};
use crate::store::ProjectCatalog;

/// State injected into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub provisioner: Provisioner,
    pub artifacts: ArtifactStore,
    /// Absent when boot supervision is disabled
    pub boot: Option<Arc<BootGate>>,
    /// `host[:port]` devices use to call back, embedded in scripts
    pub public_address: String,
}

impl AppState {
    pub fn new(provisioner: Provisioner, artifacts: ArtifactStore, public_address: impl Into<String>) -> Self {
        Self {
            provisioner,
            artifacts,
            boot: None,
            public_address: public_address.into(),
        }
    }

    pub fn with_boot_gate(mut self, gate: Arc<BootGate>) -> Self {
        self.boot = Some(gate);
        self
    }

    /// Shared handle to the project catalog
    pub fn catalog(&self) -> Arc<ProjectCatalog> {
        Arc::clone(self.provisioner.catalog())
    }
}
