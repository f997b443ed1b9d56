//! Artifact uploads
//!
//! Bodies are streamed straight to disk; downloads are served separately at
//! `/uploads/*`.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::infra::artifacts::{ArtifactInfo, StoredArtifact};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub sha256: Option<String>,
}

/// `POST /upload/:name`
pub async fn upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Result<(StatusCode, Json<StoredArtifact>), ApiError> {
    let stored = state
        .artifacts
        .store_stream(&name, query.sha256.as_deref(), body.into_data_stream())
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /upload/list`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ArtifactInfo>>, ApiError> {
    Ok(Json(state.artifacts.list().await?))
}

/// `DELETE /upload/:name`
pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.artifacts.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
