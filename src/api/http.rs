use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::{PipelineStats, StatsSnapshot};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
    #[error("Server error: {0}")]
    Server(String),
}

impl From<ApiError> for StatusCode {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response structure for status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub program: String,
    pub uptime_seconds: u64,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<PipelineStats>,
    pub started_at: Instant,
    pub program_address: String,
}

impl AppState {
    pub fn new(stats: Arc<PipelineStats>, program_address: &str) -> Self {
        Self {
            stats,
            started_at: Instant::now(),
            program_address: program_address.to_string(),
        }
    }
}

/// Routes of the status API, without binding a socket
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/health", get(get_health))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Read-only HTTP server over the pipeline counters
pub struct ApiServer {
    state: AppState,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: &str, port: u16) -> Self {
        Self {
            state,
            host: host.to_string(),
            port,
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = format!("{}:{}", self.host, self.port);
        if addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ApiError::InvalidAddress(addr));
        }

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Status API listening on {}", addr);

        axum::serve(listener, router(self.state.clone()))
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// GET /status - pipeline counters, uptime and the watched program
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        program: state.program_address.clone(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        stats: state.stats.snapshot(),
    })
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message: "Available endpoints: /status, /health".to_string(),
        }),
    )
}
