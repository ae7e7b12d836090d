use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::TelerxServer;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system health status
    #[schema(example = "healthy")]
    pub status: String,
    /// Current timestamp in RFC3339 format
    #[schema(example = "2026-01-15T10:30:00Z")]
    pub timestamp: String,
    /// API version
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Individual dependency checks
    pub checks: HashMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    /// Application name
    #[schema(example = "TeleRx Engine")]
    pub name: String,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report, healthy or degraded", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(server): State<TelerxServer>,
) -> Result<Json<ApiResponse<HealthResponse>>, ApiError> {
    let mut checks = HashMap::new();

    let database = match sqlx::query("SELECT 1").execute(&server.db_pool).await {
        Ok(_) => "healthy".to_string(),
        Err(e) => format!("unreachable: {e}"),
    };
    let degraded = database != "healthy";
    checks.insert("database".to_string(), database);

    checks.insert(
        "carrier_tracking".to_string(),
        if server.carrier.is_some() {
            "enabled".to_string()
        } else {
            "disabled".to_string()
        },
    );

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    Ok(Json(api_success(response)))
}

/// Version information handler
#[utoipa::path(
    get,
    path = "/version",
    tag = "health",
    responses(
        (status = 200, description = "Version information retrieved successfully", body = VersionResponse)
    )
)]
pub async fn version_info() -> Result<Json<ApiResponse<VersionResponse>>, ApiError> {
    let response = VersionResponse {
        name: "TeleRx Engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Ok(Json(api_success(response)))
}
