//! Credential access audit trail.
//!
//! Every lifecycle event and every decrypt-for-use of a pharmacy backend
//! credential leaves a row in `credential_audit`. A failed append fails the
//! operation that needed the credential.

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

/// Audit sink for backend credential lifecycle and access events.
#[derive(Clone)]
pub struct CredentialAuditService {
    db_pool: PgPool,
}

impl CredentialAuditService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Append one audit row. `actor` is the authenticated admin for
    /// lifecycle events and `None` for pipeline-initiated access.
    pub async fn record(
        &self,
        credential_id: Uuid,
        action: &str,
        actor: Option<Uuid>,
        detail: Option<JsonValue>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO credential_audit (
                id, credential_id, action, actor, detail, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(credential_id)
        .bind(action)
        .bind(actor)
        .bind(detail)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to record credential audit event: {e}")))?;

        Ok(())
    }

    /// Log credential onboarding.
    pub async fn log_onboarded(&self, credential_id: Uuid, actor: Uuid) -> Result<(), ApiError> {
        self.record(credential_id, "onboarded", Some(actor), None)
            .await
    }

    /// Log a decrypt-for-use of the credential secret.
    pub async fn log_revealed(&self, credential_id: Uuid, purpose: &str) -> Result<(), ApiError> {
        self.record(
            credential_id,
            "revealed",
            None,
            Some(serde_json::json!({ "purpose": purpose })),
        )
        .await
    }

    /// Log a secret re-encryption under the current vault key.
    pub async fn log_rotated(&self, credential_id: Uuid, actor: Uuid) -> Result<(), ApiError> {
        self.record(credential_id, "rotated", Some(actor), None)
            .await
    }

    /// Log credential deactivation.
    pub async fn log_deactivated(&self, credential_id: Uuid, actor: Uuid) -> Result<(), ApiError> {
        self.record(credential_id, "deactivated", Some(actor), None)
            .await
    }
}
