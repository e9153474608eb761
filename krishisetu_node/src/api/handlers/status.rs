use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::api::server::AppState;
use crate::service::NetworkStats;

/// Response for the liveness probe
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Storage backend in use
    pub backend: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.service.backend_name().to_string(),
    })
}

/// GET /api/blockchain
pub async fn network_status(State(state): State<AppState>) -> Json<NetworkStats> {
    Json(state.service.network_stats().await)
}
