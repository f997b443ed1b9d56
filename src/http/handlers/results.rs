//! Provisioning history queries

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::core::session::ProvisioningSession;
use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::store::sessions::SessionMap;

use super::run_blocking;

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub serial: String,
    /// Session key
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct SerialQuery {
    pub serial: String,
}

/// `GET /result/getresult`
pub async fn get_result(
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> Result<Json<ProvisioningSession>, ApiError> {
    let provisioner = state.provisioner;
    let session =
        run_blocking(move || provisioner.get(&query.serial, &query.timestamp)).await??;
    Ok(Json(session))
}

/// `GET /result/getresultsbyserial`
pub async fn get_results_by_serial(
    State(state): State<AppState>,
    Query(query): Query<SerialQuery>,
) -> Result<Json<Vec<ProvisioningSession>>, ApiError> {
    let provisioner = state.provisioner;
    Ok(Json(run_blocking(move || provisioner.by_serial(&query.serial)).await??))
}

/// `GET /result/getresults`
pub async fn get_results(State(state): State<AppState>) -> Result<Json<SessionMap>, ApiError> {
    let provisioner = state.provisioner;
    Ok(Json(run_blocking(move || provisioner.all()).await??))
}
