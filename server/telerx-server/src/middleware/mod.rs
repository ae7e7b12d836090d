//! HTTP middleware stack: CORS, request timing, auth context extraction.

pub mod auth_context;

pub use auth_context::AuthContext;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

/// CORS layer for the API. Patient payment pages are served cross-origin
/// from the storefront, so GET must be open; everything sensitive is
/// protected by tokens rather than origin.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}

/// Log method, path, status and elapsed time for every request.
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
