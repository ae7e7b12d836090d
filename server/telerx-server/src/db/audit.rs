//! Postgres-backed [`TransitionLog`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use fulfillment_engine::{FulfillmentError, FulfillmentResult, TransitionLog, TransitionRecord};

/// Append-only sink writing fulfillment transitions to `fulfillment_transitions`.
///
/// A failed append fails the surrounding state change; the pipeline never
/// advances a prescription it could not audit.
pub struct PgTransitionLog {
    pool: PgPool,
}

impl PgTransitionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransitionLog for PgTransitionLog {
    async fn record(&self, entry: &TransitionRecord) -> FulfillmentResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fulfillment_transitions (
                id, prescription_id, queue_id, actor,
                previous_status, requested_status, outcome,
                tracking_number, note, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.prescription_id)
        .bind(&entry.queue_id)
        .bind(&entry.actor)
        .bind(entry.previous_status.as_str())
        .bind(entry.requested_status.as_str())
        .bind(entry.outcome.as_str())
        .bind(&entry.tracking_number)
        .bind(&entry.note)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| FulfillmentError::Storage(e.to_string()))?;

        Ok(())
    }
}
