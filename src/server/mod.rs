//! HTTP control surface.
//!
//! Test harnesses drive the emulator over plain GET requests whose query
//! strings carry job parameters. Every control route answers `Success`;
//! bad parameters fall back to defaults rather than failing the request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::control::{parse_bool, Job, JobController, PlaybackRequest};
use crate::metrics::StreamMetrics;

/// Capture replayed when a request names neither a file nor `generate`.
pub const DEFAULT_CAPTURE: &str = "person.cptv";

const BANNER: &str = "This is a Fake thermal camera test server.";

/// Errors that can occur while serving the control API.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct ControlServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self::with_port(2040)
    }
}

impl ControlServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Shared state handed to every handler.
pub struct ControlState {
    controller: Arc<JobController>,
    metrics: StreamMetrics,
}

/// HTTP server that forwards requests to the job controller.
pub struct ControlServer {
    config: ControlServerConfig,
    state: Arc<ControlState>,
}

impl ControlServer {
    pub fn new(
        config: ControlServerConfig,
        controller: Arc<JobController>,
        metrics: StreamMetrics,
    ) -> Self {
        Self {
            config,
            state: Arc::new(ControlState {
                controller,
                metrics,
            }),
        }
    }

    /// Builds the route table.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(home_handler))
            .route("/sendCPTVFrames", get(send_frames_handler))
            .route("/playback", get(playback_handler))
            .route("/clearCPTVQueue", get(clear_queue_handler))
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until the runtime stops.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let app = self.router();

        info!(%addr, "Control server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

async fn home_handler() -> impl IntoResponse {
    BANNER
}

async fn send_frames_handler(
    State(state): State<Arc<ControlState>>,
    Query(mut params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let generate = params
        .get("generate")
        .and_then(|v| parse_bool(v.trim()))
        .unwrap_or(false);
    let named = params.get("cptv-file").is_some_and(|f| !f.is_empty());
    if !generate && !named {
        params.insert("cptv-file".to_string(), DEFAULT_CAPTURE.to_string());
    }

    let job = Job::from_params(&params);
    let handle = state.controller.submit(job);
    state.metrics.set_queue_depth(state.controller.len());
    info!(job = handle.id(), "Sent CPTV frames");
    "Success"
}

async fn playback_handler(
    State(state): State<Arc<ControlState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.controller.playback(PlaybackRequest::from_params(&params));
    state.metrics.set_queue_depth(state.controller.len());
    "Success"
}

async fn clear_queue_handler(
    State(state): State<Arc<ControlState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let stop = params
        .get("stop")
        .and_then(|v| parse_bool(v.trim()))
        .unwrap_or(false);
    state.controller.clear(stop);
    state.metrics.set_queue_depth(0);
    "Success"
}

async fn metrics_handler(State(state): State<Arc<ControlState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
