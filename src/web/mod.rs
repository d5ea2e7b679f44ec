pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{detection::DetectionService, utils::error::DetectError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DetectionService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: DetectionService, config: Config) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // session construction blocks on file IO and graph optimization
    let load_config = config.clone();
    let service = tokio::task::spawn_blocking(move || DetectionService::from_config(&load_config))
        .await
        .map_err(|e| DetectError::Internal(format!("Model loading task failed: {}", e)))?;

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        DetectError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    let app = create_app(AppState::new(service, config));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /detect           - Multipart file upload");
    tracing::info!("  POST /detect/json      - JSON base64 upload");
    tracing::info!("  POST /detect/compare   - Per-model comparison");
    tracing::info!("  GET  /models/status    - Model readiness");
    tracing::info!("  PUT  /models/ensemble  - Toggle ensemble mode");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/info         - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DetectError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DetectError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let permits = Arc::new(Semaphore::new(server_config.max_connections.max(1)));

    Router::new()
        .route("/detect", post(handlers::detect_upload_handler))
        .route("/detect/json", post(handlers::detect_json_handler))
        .route("/detect/compare", post(handlers::compare_handler))
        .route("/models/status", get(handlers::model_status_handler))
        .route("/models/ensemble", put(handlers::ensemble_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // the body limit below replaces axum's 2MB extractor default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server_config.request_timeout),
        ))
        .layer(CorsLayer::permissive())
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn_with_state(permits, middleware::concurrency_limit))
        .layer(from_fn(middleware::request_logging))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.service.status();

    Json(json!({
        "status": if status.model_ready { "healthy" } else { "degraded" },
        "model_ready": status.model_ready,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.service.status();

    Json(json!({
        "service": "Food Detection Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "mode": state.service.mode(),
        "models": status,
        "detector": state.config.yolo_params,
        "limits": {
            "max_request_size": state.config.server_config.max_request_size,
            "request_timeout_secs": state.config.server_config.request_timeout
        }
    }))
}
