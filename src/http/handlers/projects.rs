//! Project administration

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::core::project::Project;
use crate::http::error::ApiError;
use crate::http::state::AppState;

use super::run_blocking;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

pub async fn get_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.list()).await??))
}

pub async fn get_project(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Project>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.get(&query.name)).await??))
}

/// 503 when no project is active
pub async fn get_active_project(State(state): State<AppState>) -> Result<Json<Project>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.get_active()).await??))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(project): Json<Project>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let catalog = state.catalog();
    let created = run_blocking(move || catalog.create(project)).await??;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Json(project): Json<Project>,
) -> Result<Json<Project>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.update(project)).await??))
}

pub async fn set_active_project(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Project>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.set_active(&query.name)).await??))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Project>, ApiError> {
    let catalog = state.catalog();
    Ok(Json(run_blocking(move || catalog.delete(&query.name)).await??))
}
