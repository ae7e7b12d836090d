//! Postgres-backed [`TierStore`].
//!
//! Discounts are stored as integer basis points (1500 = 15.00%), keeping
//! the no-floats-in-storage rule uniform with the cents columns.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use payment_links::{PaymentLinkError, PaymentLinkResult, TierStore};
use pricing_engine::Tier;

/// Read-side repository for provider pricing tiers.
pub struct PgTierStore {
    pool: PgPool,
}

impl PgTierStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TierRow {
    code: String,
    name: String,
    discount_basis_points: i32,
}

#[async_trait]
impl TierStore for PgTierStore {
    async fn find_for_provider(&self, provider_id: Uuid) -> PaymentLinkResult<Option<Tier>> {
        let row = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT code, name, discount_basis_points
            FROM provider_tiers
            WHERE provider_id = $1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PaymentLinkError::Storage(e.to_string()))?;

        Ok(row.map(|r| Tier {
            code: r.code,
            name: r.name,
            discount_percent: Decimal::new(i64::from(r.discount_basis_points), 2),
        }))
    }
}
