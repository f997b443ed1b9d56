//! Durable state
//!
//! - `document`: single-file JSON persistence shared by both stores
//! - `catalog`: projects and the active-project marker
//! - `sessions`: provisioning history

pub mod catalog;
pub mod document;
pub mod sessions;

use std::sync::Arc;

pub use catalog::ProjectCatalog;
pub use document::JsonDocument;
pub use sessions::SessionStore;

use crate::error::ProvisionError;
use crate::infra::dirs::DataLayout;

/// Both stores of a data directory, opened together
#[derive(Debug, Clone)]
pub struct Stores {
    pub catalog: Arc<ProjectCatalog>,
    pub sessions: Arc<SessionStore>,
}

impl Stores {
    pub fn open(layout: &DataLayout) -> Result<Self, ProvisionError> {
        let catalog = ProjectCatalog::open(layout.projects_path())?;
        let sessions = SessionStore::open(layout.results_path())?;
        tracing::debug!(root = %layout.root().display(), "Opened data directory");
        Ok(Self {
            catalog: Arc::new(catalog),
            sessions: Arc::new(sessions),
        })
    }
}
