//! Postgres-backed [`PaymentTransactionStore`].
//!
//! The single-pending-link-per-prescription guarantee rests on a partial
//! unique index over `(prescription_id) WHERE status = 'pending'`; the
//! conditional insert rides on it with `ON CONFLICT ... DO NOTHING`, so two
//! concurrent link requests cannot both insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fulfillment_engine::PrescriptionStatus;
use payment_links::{
    InsertOutcome, NewPaymentTransaction, PaymentLinkError, PaymentLinkResult, PaymentTransaction,
    PaymentTransactionStore, TransactionStatus,
};
use pricing_engine::{cents_to_dollars, dollars_to_cents};

/// Repository for payment transactions backing hosted payment links.
pub struct PgPaymentTransactionStore {
    pool: PgPool,
}

impl PgPaymentTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    prescription_id: Uuid,
    token: String,
    hosted_url: String,
    description: String,
    consultation_fee_cents: i64,
    medication_cost_cents: i64,
    total_amount_cents: i64,
    profit_cents: i64,
    status: String,
    processor_ref: Option<String>,
    order_status: String,
    tracking_number: Option<String>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> PaymentLinkResult<PaymentTransaction> {
        let status = TransactionStatus::parse(&self.status).ok_or_else(|| {
            PaymentLinkError::Storage(format!(
                "payment transaction {} has unknown status {:?}",
                self.id, self.status
            ))
        })?;
        let order_status = PrescriptionStatus::parse(&self.order_status).ok_or_else(|| {
            PaymentLinkError::Storage(format!(
                "payment transaction {} has unknown order status {:?}",
                self.id, self.order_status
            ))
        })?;

        Ok(PaymentTransaction {
            id: self.id,
            prescription_id: self.prescription_id,
            token: self.token,
            hosted_url: self.hosted_url,
            description: self.description,
            consultation_fee: cents_to_dollars(self.consultation_fee_cents),
            medication_cost: cents_to_dollars(self.medication_cost_cents),
            total_amount: cents_to_dollars(self.total_amount_cents),
            profit: cents_to_dollars(self.profit_cents),
            status,
            processor_ref: self.processor_ref,
            order_status,
            tracking_number: self.tracking_number,
            expires_at: self.expires_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage_err(err: sqlx::Error) -> PaymentLinkError {
    PaymentLinkError::Storage(err.to_string())
}

#[async_trait]
impl PaymentTransactionStore for PgPaymentTransactionStore {
    async fn find_pending_for_prescription(
        &self,
        prescription_id: Uuid,
    ) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM payment_transactions
            WHERE prescription_id = $1 AND status = 'pending'
            "#,
        )
        .bind(prescription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn insert_pending_if_absent(
        &self,
        transaction: NewPaymentTransaction,
    ) -> PaymentLinkResult<InsertOutcome> {
        let inserted = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO payment_transactions (
                id, prescription_id, token, hosted_url, description,
                consultation_fee_cents, medication_cost_cents,
                total_amount_cents, profit_cents,
                status, order_status, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, NOW(), NOW())
            ON CONFLICT (prescription_id) WHERE status = 'pending' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction.prescription_id)
        .bind(&transaction.token)
        .bind(&transaction.hosted_url)
        .bind(&transaction.description)
        .bind(dollars_to_cents(transaction.consultation_fee)?)
        .bind(dollars_to_cents(transaction.medication_cost)?)
        .bind(dollars_to_cents(transaction.total_amount)?)
        .bind(dollars_to_cents(transaction.profit)?)
        .bind(transaction.order_status.as_str())
        .bind(transaction.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.into_domain()?));
        }

        // Lost the race; the winner's pending row is the link to hand out.
        let existing = self
            .find_pending_for_prescription(transaction.prescription_id)
            .await?
            .ok_or_else(|| {
                PaymentLinkError::Storage(
                    "pending transaction vanished during insert race".to_string(),
                )
            })?;
        Ok(InsertOutcome::Existing(existing))
    }

    async fn delete_if_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> PaymentLinkResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM payment_transactions
            WHERE id = $1 AND status = 'pending' AND expires_at <= $2
            "#,
        )
        .bind(transaction_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_token(&self, token: &str) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM payment_transactions
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn mark_paid(
        &self,
        token: &str,
        processor_ref: &str,
        paid_at: DateTime<Utc>,
    ) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE payment_transactions
            SET status = 'paid',
                processor_ref = $2,
                paid_at = $3,
                updated_at = NOW()
            WHERE token = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(token)
        .bind(processor_ref)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> PaymentLinkResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM payment_transactions
            WHERE status = 'pending' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected())
    }
}
