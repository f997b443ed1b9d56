//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use cmprovision::core::project::{ImageTier, Project};
use cmprovision::http::{create_router, AppState};
use cmprovision::infra::artifacts::ArtifactStore;
use cmprovision::infra::dirs::DataLayout;
use cmprovision::provision::{LiveUpdateHub, Provisioner};
use cmprovision::store::Stores;

/// Address embedded in rendered scripts during tests
pub const PUBLIC_ADDRESS: &str = "172.20.0.1";

/// Temporary data directory with opened stores
///
/// Everything lives under one [`TempDir`], laid out the way `serve` lays out
/// its data directory.
pub struct TestDataDir {
    /// Temporary root
    pub dir: TempDir,
    pub stores: Stores,
    pub hub: LiveUpdateHub,
}

impl TestDataDir {
    /// Create an empty data directory
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let stores = Stores::open(&DataLayout::new(dir.path())).expect("Failed to open stores");
        Self {
            dir,
            stores,
            hub: LiveUpdateHub::new(),
        }
    }

    /// Path of the data directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.dir.path())
    }

    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(
            Arc::clone(&self.stores.catalog),
            Arc::clone(&self.stores.sessions),
            self.hub.clone(),
        )
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.provisioner(),
            ArtifactStore::new(self.layout().uploads_dir()),
            PUBLIC_ADDRESS,
        )
    }

    /// Router over this data directory
    pub fn app(&self) -> Router {
        create_router(self.state())
    }

    /// Add an active project serving `image` for every capacity
    pub fn activate_project(&self, name: &str, image: &str) -> Project {
        self.stores
            .catalog
            .create(
                Project::new(name)
                    .with_image(ImageTier::Small, image)
                    .with_active(true),
            )
            .expect("Failed to create project")
    }

    /// Write a file relative to the data directory
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Read a file relative to the data directory
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

impl Default for TestDataDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one request through the router
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.expect("Router failed");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec();
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Invalid request")
}

pub fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(body.into())
        .expect("Invalid request")
}

pub fn post_json(uri: &str, value: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("Invalid request")
}

pub fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("Response is not JSON")
}

/// Path of the settings file a CLI test should use
pub fn missing_settings(root: &Path) -> PathBuf {
    root.join("no-such-settings.toml")
}
