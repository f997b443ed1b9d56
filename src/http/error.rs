//! HTTP error responses
//!
//! Every domain error maps onto a status code and a JSON body
//! `{"error": "...", "code": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{
    ArtifactError, BootError, CatalogError, NetworkError, ProvisionError, SessionError, StoreError,
};

/// Error returned by handlers
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", error)
    }
}

fn classify(err: &ProvisionError) -> (StatusCode, &'static str) {
    use ProvisionError as P;

    match err {
        P::Catalog(e) | P::Session(SessionError::Catalog(e)) => match e {
            CatalogError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CatalogError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            CatalogError::NoActiveProject => (StatusCode::SERVICE_UNAVAILABLE, "NO_ACTIVE_PROJECT"),
            CatalogError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            CatalogError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        },
        P::Session(e) => match e {
            SessionError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            SessionError::AlreadyCompleted { .. } => (StatusCode::CONFLICT, "ALREADY_COMPLETED"),
            SessionError::NoActiveProject { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "NO_ACTIVE_PROJECT")
            }
            SessionError::NoImage { .. } => (StatusCode::SERVICE_UNAVAILABLE, "NO_IMAGE"),
            SessionError::Catalog(_) | SessionError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
            }
        },
        P::Artifact(e) => match e {
            ArtifactError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ArtifactError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            ArtifactError::ChecksumMismatch { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CHECKSUM_MISMATCH")
            }
            ArtifactError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ArtifactError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        },
        P::Boot(BootError::AlreadyRunning) => (StatusCode::CONFLICT, "ALREADY_RUNNING"),
        P::Boot(_) | P::Network(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        P::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        P::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        let (status, code) = classify(&err);
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %err, "Request failed");
        }
        // Report the domain error itself, not the wrapper's prefix
        let message = match &err {
            ProvisionError::Catalog(e) => e.to_string(),
            ProvisionError::Session(e) => e.to_string(),
            ProvisionError::Artifact(e) => e.to_string(),
            ProvisionError::Boot(e) => e.to_string(),
            ProvisionError::Network(e) => e.to_string(),
            ProvisionError::Store(e) => e.to_string(),
            ProvisionError::InvalidRequest(msg) => msg.clone(),
        };
        Self::new(status, code, message)
    }
}

macro_rules! via_provision_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(err: $ty) -> Self {
                    ProvisionError::from(err).into()
                }
            }
        )*
    };
}

via_provision_error!(
    ArtifactError,
    BootError,
    CatalogError,
    NetworkError,
    SessionError,
    StoreError,
);

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "Blocking store task failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Store task failed",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
