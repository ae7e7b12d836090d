//! Admin endpoints for pharmacy backend credentials.
//!
//! Secrets are encrypted before they reach storage and never leave it
//! through this API; responses expose only connection metadata and whether
//! the stored secret is encrypted yet. All four endpoints require the admin
//! role and append to the credential audit trail.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use credential_vault::{
    BackendCredential, NewBackendCredential, PharmacySystem, SecretMaterial,
};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::AuthContext;
use crate::server::TelerxServer;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_required, validate_uuid};

/// Sanitized view of a backend credential
#[derive(Debug, Serialize, ToSchema)]
pub struct BackendView {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    /// Pharmacy system protocol
    #[schema(example = "digital_rx")]
    pub system: String,
    pub base_url: String,
    pub store_id: Option<String>,
    pub location_id: Option<String>,
    pub active: bool,
    /// Whether the stored secret is an encrypted record; `false` flags a
    /// legacy plaintext row awaiting re-encryption
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackendView {
    fn from_credential(credential: BackendCredential) -> Self {
        Self {
            id: credential.id,
            pharmacy_id: credential.pharmacy_id,
            system: credential.system.to_string(),
            base_url: credential.base_url,
            store_id: credential.store_id,
            location_id: credential.location_id,
            active: credential.active,
            encrypted: SecretMaterial::is_encrypted(&credential.secret),
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

/// Onboarding request for a pharmacy backend. The secret arrives in
/// plaintext over TLS and is encrypted before it is stored; the struct
/// deliberately has no `Debug` so it cannot end up in logs.
#[derive(Deserialize, ToSchema)]
pub struct CreateBackendRequest {
    pub pharmacy_id: Uuid,
    /// Pharmacy system protocol
    #[schema(example = "digital_rx")]
    pub system: String,
    #[schema(example = "https://api.digitalrx.example")]
    pub base_url: String,
    pub store_id: Option<String>,
    pub location_id: Option<String>,
    /// Backend API secret
    pub secret: String,
}

impl RequestValidation for CreateBackendRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_uuid!(self.pharmacy_id, "Pharmacy ID is required");
        validate_required!(self.base_url, "Base URL is required");
        validate_field!(
            self.base_url,
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://"),
            "Base URL must start with http:// or https://"
        );
        validate_required!(self.secret, "Secret is required");
        Ok(())
    }
}

fn parse_system(value: &str) -> Result<PharmacySystem, ApiError> {
    PharmacySystem::parse(value)
        .ok_or_else(|| ApiError::validation("System must be one of: digital_rx, pioneer_rx"))
}

/// List pharmacy backends
#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/backends",
    tag = "pharmacy-backends",
    responses(
        (status = 200, description = "All backend credentials, secrets omitted", body = Vec<BackendView>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_backends(
    State(server): State<TelerxServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<BackendView>>>, ApiError> {
    auth.require_admin()?;

    let backends = server.credentials.list().await?;
    let views = backends.into_iter().map(BackendView::from_credential).collect();

    Ok(Json(api_success(views)))
}

/// Onboard a pharmacy backend
#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/backends",
    tag = "pharmacy-backends",
    request_body = CreateBackendRequest,
    responses(
        (status = 201, description = "Backend onboarded", body = BackendView),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_backend(
    State(server): State<TelerxServer>,
    auth: AuthContext,
    Json(request): Json<CreateBackendRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BackendView>>), ApiError> {
    auth.require_admin()?;
    request.validate()?;
    let system = parse_system(&request.system)?;

    let encrypted_secret = server.vault.encrypt(&request.secret)?;
    let credential = server
        .credentials
        .insert(NewBackendCredential {
            pharmacy_id: request.pharmacy_id,
            system,
            base_url: request.base_url,
            store_id: request.store_id,
            location_id: request.location_id,
            secret: encrypted_secret,
        })
        .await?;

    server.audit.log_onboarded(credential.id, auth.user_id).await?;
    info!(
        credential_id = %credential.id,
        pharmacy_id = %credential.pharmacy_id,
        system = %credential.system,
        "pharmacy backend onboarded"
    );

    Ok((
        StatusCode::CREATED,
        Json(api_success(BackendView::from_credential(credential))),
    ))
}

/// Re-encrypt a backend secret under the current vault key
///
/// Also migrates legacy plaintext rows into encrypted records.
#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/backends/{id}/reencrypt",
    tag = "pharmacy-backends",
    params(
        ("id" = Uuid, Path, description = "Backend credential ID")
    ),
    responses(
        (status = 200, description = "Secret re-encrypted", body = BackendView),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Backend credential not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reencrypt_backend(
    State(server): State<TelerxServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BackendView>>, ApiError> {
    auth.require_admin()?;

    let credential = server
        .credentials
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("backend credential"))?;

    let plaintext = server.vault.reveal(&credential.secret_material())?;
    let fresh = server.vault.rotate(&plaintext)?;

    let updated = server.credentials.update_secret(id, &fresh).await?;
    if !updated {
        return Err(ApiError::not_found("backend credential"));
    }
    server.audit.log_rotated(id, auth.user_id).await?;
    info!(credential_id = %id, "backend secret re-encrypted");

    let refreshed = server
        .credentials
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("backend credential"))?;

    Ok(Json(api_success(BackendView::from_credential(refreshed))))
}

/// Deactivate a pharmacy backend
///
/// The row is kept so the credential audit trail keeps resolving.
#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/backends/{id}/deactivate",
    tag = "pharmacy-backends",
    params(
        ("id" = Uuid, Path, description = "Backend credential ID")
    ),
    responses(
        (status = 200, description = "Backend deactivated", body = BackendView),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Backend credential not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_backend(
    State(server): State<TelerxServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BackendView>>, ApiError> {
    auth.require_admin()?;

    let deactivated = server.credentials.deactivate(id).await?;
    if !deactivated {
        return Err(ApiError::not_found("backend credential"));
    }
    server.audit.log_deactivated(id, auth.user_id).await?;
    info!(credential_id = %id, "pharmacy backend deactivated");

    let refreshed = server
        .credentials
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("backend credential"))?;

    Ok(Json(api_success(BackendView::from_credential(refreshed))))
}
