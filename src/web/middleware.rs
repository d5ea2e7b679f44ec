use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Request logging middleware
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let start_time = Instant::now();

    tracing::info!(
        "Request started: {} {} - User-Agent: {}",
        method,
        uri,
        user_agent
    );

    let response = next.run(req).await;

    tracing::info!(
        "Request completed: {} {} - {} - {}ms",
        method,
        uri,
        response.status(),
        start_time.elapsed().as_millis()
    );

    response
}

/// Caps in-flight requests at the configured connection limit; excess
/// requests wait for a permit.
pub async fn concurrency_limit(
    State(permits): State<Arc<Semaphore>>,
    req: Request,
    next: Next,
) -> Response {
    // the semaphore is never closed
    let _permit = permits.acquire_owned().await.ok();
    next.run(req).await
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    response
}
