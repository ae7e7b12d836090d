//! Postgres-backed [`BackendCredentialStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use credential_vault::{
    BackendCredential, BackendCredentialStore, NewBackendCredential, PharmacySystem, VaultError,
    VaultResult,
};

/// Repository for pharmacy backend connection records.
pub struct PgBackendCredentialStore {
    pool: PgPool,
}

impl PgBackendCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    pharmacy_id: Uuid,
    system: String,
    base_url: String,
    store_id: Option<String>,
    location_id: Option<String>,
    secret: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_domain(self) -> VaultResult<BackendCredential> {
        let system = PharmacySystem::parse(&self.system).ok_or_else(|| {
            VaultError::Storage(format!(
                "backend credential {} has unknown system {:?}",
                self.id, self.system
            ))
        })?;

        Ok(BackendCredential {
            id: self.id,
            pharmacy_id: self.pharmacy_id,
            system,
            base_url: self.base_url,
            store_id: self.store_id,
            location_id: self.location_id,
            secret: self.secret,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage_err(err: sqlx::Error) -> VaultError {
    VaultError::Storage(err.to_string())
}

#[async_trait]
impl BackendCredentialStore for PgBackendCredentialStore {
    async fn find_active_for_pharmacy(
        &self,
        pharmacy_id: Uuid,
    ) -> VaultResult<Option<BackendCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT * FROM pharmacy_backends
            WHERE pharmacy_id = $1 AND active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(CredentialRow::into_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<BackendCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT * FROM pharmacy_backends
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(CredentialRow::into_domain).transpose()
    }

    async fn insert(&self, credential: NewBackendCredential) -> VaultResult<BackendCredential> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            INSERT INTO pharmacy_backends (
                id, pharmacy_id, system, base_url, store_id, location_id,
                secret, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(credential.pharmacy_id)
        .bind(credential.system.as_str())
        .bind(&credential.base_url)
        .bind(&credential.store_id)
        .bind(&credential.location_id)
        .bind(&credential.secret)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        row.into_domain()
    }

    async fn update_secret(&self, id: Uuid, secret: &str) -> VaultResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pharmacy_backends
            SET secret = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(&self, id: Uuid) -> VaultResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pharmacy_backends
            SET active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> VaultResult<Vec<BackendCredential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT * FROM pharmacy_backends
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(CredentialRow::into_domain).collect()
    }
}
