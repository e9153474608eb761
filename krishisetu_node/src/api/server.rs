use anyhow::Result;
use axum::{
    http::Method,
    routing::get,
    Router,
};
use log::info;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{blockchain, status};
use crate::service::TraceabilityService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TraceabilityService>,
}

impl AppState {
    pub fn new(service: TraceabilityService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// API Router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health_check))
        .route(
            "/api/blockchain",
            get(status::network_status).post(blockchain::dispatch_action),
        )
        // dashboards are served from another origin
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        )
        .with_state(state)
}

/// API Server struct
pub struct ApiServer {
    pub address: String,
    pub state: AppState,
}

impl ApiServer {
    pub fn new(address: String, state: AppState) -> Self {
        Self { address, state }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.address).await?;
        info!("KrishiSetu API listening on http://{}", self.address);
        info!("  GET  /health           - Health check");
        info!("  GET  /api/blockchain   - Store status and product counts");
        info!("  POST /api/blockchain   - Traceability actions");

        axum::serve(listener, create_router(self.state).into_make_service()).await?;
        Ok(())
    }
}
