//! Project catalog
//!
//! Durable mapping of project name to [`Project`]. At most one project is
//! active at any time; every write that sets `active` clears it on all other
//! records within the same locked update.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::project::{validate_project_name, Project};
use crate::error::CatalogError;

use super::document::JsonDocument;

/// On-disk shape of the catalog
pub type ProjectMap = BTreeMap<String, Project>;

/// Durable project catalog
#[derive(Debug)]
pub struct ProjectCatalog {
    doc: JsonDocument<ProjectMap>,
}

fn deactivate_all(projects: &mut ProjectMap) {
    for project in projects.values_mut() {
        project.active = false;
    }
}

fn committed(projects: &ProjectMap, name: &str) -> Result<Project, CatalogError> {
    projects.get(name).cloned().ok_or_else(|| CatalogError::NotFound {
        name: name.to_string(),
    })
}

impl ProjectCatalog {
    /// Open the catalog at `path`, creating an empty one if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        Ok(Self {
            doc: JsonDocument::open(path)?,
        })
    }

    /// Add a new project
    ///
    /// Creating an active project deactivates every other project.
    pub fn create(&self, project: Project) -> Result<Project, CatalogError> {
        validate_project_name(&project.name)?;
        let name = project.name.clone();

        let ((), projects) = self.doc.update(|projects| {
            if projects.contains_key(&name) {
                return Err(CatalogError::AlreadyExists { name: name.clone() });
            }
            if project.active {
                deactivate_all(projects);
            }
            projects.insert(name.clone(), project);
            Ok(())
        })?;

        tracing::info!(project = %name, "Project created");
        committed(&projects, &name)
    }

    /// Replace an existing project record
    pub fn update(&self, project: Project) -> Result<Project, CatalogError> {
        let name = project.name.clone();

        let ((), projects) = self.doc.update(|projects| {
            if !projects.contains_key(&name) {
                return Err(CatalogError::NotFound { name: name.clone() });
            }
            if project.active {
                deactivate_all(projects);
            }
            projects.insert(name.clone(), project);
            Ok(())
        })?;

        tracing::info!(project = %name, "Project updated");
        committed(&projects, &name)
    }

    /// Remove a project
    pub fn delete(&self, name: &str) -> Result<Project, CatalogError> {
        let (removed, _) = self.doc.update(|projects| {
            projects.remove(name).ok_or_else(|| CatalogError::NotFound {
                name: name.to_string(),
            })
        })?;

        tracing::info!(project = %name, was_active = removed.active, "Project deleted");
        Ok(removed)
    }

    /// Make `name` the single active project
    pub fn set_active(&self, name: &str) -> Result<Project, CatalogError> {
        let ((), projects) = self.doc.update(|projects| {
            if !projects.contains_key(name) {
                return Err(CatalogError::NotFound {
                    name: name.to_string(),
                });
            }
            deactivate_all(projects);
            if let Some(project) = projects.get_mut(name) {
                project.active = true;
            }
            Ok(())
        })?;

        tracing::info!(project = %name, "Project activated");
        committed(&projects, name)
    }

    /// Look up a project
    pub fn get(&self, name: &str) -> Result<Project, CatalogError> {
        committed(&self.doc.read()?, name)
    }

    /// All projects, ordered by name
    pub fn list(&self) -> Result<Vec<Project>, CatalogError> {
        Ok(self.doc.read()?.into_values().collect())
    }

    /// The active project
    pub fn get_active(&self) -> Result<Project, CatalogError> {
        self.active()?.ok_or(CatalogError::NoActiveProject)
    }

    /// The active project, if any
    pub fn active(&self) -> Result<Option<Project>, CatalogError> {
        Ok(self.doc.read()?.into_values().find(|p| p.active))
    }
}
