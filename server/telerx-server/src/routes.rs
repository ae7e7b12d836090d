pub mod paths;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{backends, health, payment_links, webhooks},
    openapi,
    server::TelerxServer,
};

/// Create health check routes
pub fn health_routes() -> Router<TelerxServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::VERSION, get(health::version_info))
}

/// Create webhook ingress routes
pub fn webhook_routes() -> Router<TelerxServer> {
    Router::new()
        .route(
            paths::webhooks::PHARMACY,
            post(webhooks::pharmacy_status_webhook),
        )
        .route(
            paths::webhooks::PHARMACY_CANCEL,
            post(webhooks::pharmacy_cancel_webhook),
        )
        .route(
            paths::webhooks::PAYMENTS,
            post(webhooks::processor_payment_webhook),
        )
}

/// Create provider payment link routes
pub fn payment_link_routes() -> Router<TelerxServer> {
    Router::new().route(
        paths::prescriptions::PAYMENT_LINK,
        post(payment_links::create_payment_link),
    )
}

/// Create patient payment page routes
///
/// Token-authenticated and mounted at the root, outside `/api/v1`.
pub fn patient_routes() -> Router<TelerxServer> {
    Router::new()
        .route(paths::pay::PAGE, get(payment_links::pay_page))
        .route(paths::pay::TRACKING, get(payment_links::pay_tracking))
}

/// Create pharmacy backend admin routes
pub fn backend_routes() -> Router<TelerxServer> {
    Router::new()
        .route(paths::backends::BACKENDS, get(backends::list_backends))
        .route(paths::backends::BACKENDS, post(backends::create_backend))
        .route(paths::backends::REENCRYPT, post(backends::reencrypt_backend))
        .route(
            paths::backends::DEACTIVATE,
            post(backends::deactivate_backend),
        )
}

fn api_v1_routes() -> Router<TelerxServer> {
    Router::new()
        .merge(webhook_routes())
        .merge(payment_link_routes())
        .merge(backend_routes())
}

/// Assemble the full route table.
pub fn create_routes() -> Router<TelerxServer> {
    Router::new()
        // Health check routes (no authentication required)
        .merge(health_routes())
        // API documentation routes
        .merge(openapi::create_docs_routes())
        // Patient payment pages (link-token authenticated)
        .merge(patient_routes())
        // API v1 routes
        .nest(paths::API_V1, api_v1_routes())
}
