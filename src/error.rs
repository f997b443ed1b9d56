//! Error types for cmprovision
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Durable document errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error reading or writing a document
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },

    /// Document could not be serialized
    #[error("Failed to serialize '{path}': {error}")]
    Serialize { path: PathBuf, error: String },

    /// Writer lock was poisoned by a panicking writer
    #[error("Lock on '{path}' is poisoned")]
    LockPoisoned { path: PathBuf },
}

/// Project catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Project not found
    #[error("Project '{name}' not found")]
    NotFound { name: String },

    /// Project already exists
    #[error("Project '{name}' already exists")]
    AlreadyExists { name: String },

    /// No project is marked active
    #[error("No active project")]
    NoActiveProject,

    /// Project name rejected
    #[error("Invalid project name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Underlying store error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Provisioning session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Unknown (serial, session key) pair
    #[error("Session '{session_key}' not found for serial '{serial}'")]
    NotFound { serial: String, session_key: String },

    /// Session already reached its final state
    #[error("Session '{session_key}' for serial '{serial}' is already completed")]
    AlreadyCompleted { serial: String, session_key: String },

    /// No project is active, so there is nothing to flash
    #[error("No active project; cannot provision '{serial}'")]
    NoActiveProject { serial: String },

    /// The active project has no image for this device
    #[error("Project '{project}' has no image for a {capacity_gib:.2} GiB device")]
    NoImage { project: String, capacity_gib: f64 },

    /// Catalog error while resolving the project
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Underlying store error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Uploaded artifact errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Artifact not found
    #[error("Artifact '{name}' not found")]
    NotFound { name: String },

    /// Artifact already exists
    #[error("Artifact '{name}' already exists")]
    AlreadyExists { name: String },

    /// Checksum mismatch
    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Artifact name rejected
    #[error("Invalid artifact name '{name}'")]
    InvalidName { name: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Boot responder supervision errors
#[derive(Error, Debug)]
pub enum BootError {
    /// `start` called while the supervisor is running
    #[error("Boot responder supervisor is already running")]
    AlreadyRunning,

    /// Failed to launch the responder
    #[error("Failed to spawn '{program}': {error}")]
    Spawn { program: String, error: String },

    /// Failed to write responder configuration
    #[error("Failed to write boot configuration: {0}")]
    Config(#[from] FilesystemError),
}

/// Host network configuration errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Required tool missing from PATH
    #[error("Required tool '{tool}' not found in PATH")]
    ToolNotFound { tool: String },

    /// Command exited unsuccessfully
    #[error("Command '{command}' failed: {error}")]
    CommandFailed { command: String, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to rename file
    #[error("Failed to rename '{from}' to '{to}': {error}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Top-level cmprovision error type
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Catalog error
    #[error("Project error: {0}")]
    Catalog(#[from] CatalogError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Artifact error
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Boot responder error
    #[error("Boot error: {0}")]
    Boot(#[from] BootError),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Request validation failure
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
