//! TeleRx Server - prescription fulfillment and payment orchestration API
//!
//! This library provides the core functionality of the TeleRx HTTP server,
//! including pharmacy webhook ingress, hosted payment links, patient payment
//! pages, and pharmacy backend credential administration.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod signature;
pub mod validation;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::*;
pub use server::TelerxServer;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: TelerxServer) -> Router {
    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer())
                .layer(from_fn(middleware::request_timing_middleware)),
        )
        .with_state(server)
}
