//! Health check

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::http::state::AppState;
use crate::provision::BootStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub git_sha: Option<&'static str>,
    pub timestamp: String,
    /// `None` when boot supervision is disabled
    pub boot: Option<BootStatus>,
    pub subscribers: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("VERGEN_GIT_SHA"),
        timestamp: Utc::now().to_rfc3339(),
        boot: state.boot.as_ref().map(|gate| gate.status()),
        subscribers: state.provisioner.hub().subscriber_count(),
    })
}
