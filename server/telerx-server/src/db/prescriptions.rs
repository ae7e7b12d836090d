//! Postgres-backed [`FulfillmentStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fulfillment_engine::{
    FulfillmentError, FulfillmentResult, FulfillmentStore, MedicationOrder, PaymentStatus,
    Prescription, PrescriptionStatus,
};
use pricing_engine::cents_to_dollars;

/// Repository for prescriptions and their fulfillment progress.
pub struct PgFulfillmentStore {
    pool: PgPool,
}

impl PgFulfillmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PrescriptionRow {
    id: Uuid,
    provider_id: Uuid,
    patient_id: Uuid,
    pharmacy_id: Uuid,
    patient_name: String,
    provider_name: String,
    medication_name: String,
    medication_strength: String,
    quantity: i32,
    refills: i32,
    instructions: Option<String>,
    acquisition_cost_cents: i64,
    consultation_fee_cents: i64,
    queue_id: Option<String>,
    status: String,
    payment_status: String,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PrescriptionRow {
    fn into_domain(self) -> FulfillmentResult<Prescription> {
        let status = PrescriptionStatus::parse(&self.status).ok_or_else(|| {
            FulfillmentError::Storage(format!(
                "prescription {} has unknown status {:?}",
                self.id, self.status
            ))
        })?;
        let payment_status = PaymentStatus::parse(&self.payment_status).ok_or_else(|| {
            FulfillmentError::Storage(format!(
                "prescription {} has unknown payment status {:?}",
                self.id, self.payment_status
            ))
        })?;

        Ok(Prescription {
            id: self.id,
            provider_id: self.provider_id,
            patient_id: self.patient_id,
            pharmacy_id: self.pharmacy_id,
            patient_name: self.patient_name,
            provider_name: self.provider_name,
            medication: MedicationOrder {
                name: self.medication_name,
                strength: self.medication_strength,
                quantity: self.quantity,
                refills: self.refills,
                instructions: self.instructions,
            },
            acquisition_cost: cents_to_dollars(self.acquisition_cost_cents),
            consultation_fee: cents_to_dollars(self.consultation_fee_cents),
            queue_id: self.queue_id,
            status,
            payment_status,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage_err(err: sqlx::Error) -> FulfillmentError {
    FulfillmentError::Storage(err.to_string())
}

#[async_trait]
impl FulfillmentStore for PgFulfillmentStore {
    async fn find_by_queue_id(&self, queue_id: &str) -> FulfillmentResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(
            r#"
            SELECT * FROM prescriptions
            WHERE queue_id = $1
            "#,
        )
        .bind(queue_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(PrescriptionRow::into_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> FulfillmentResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(
            r#"
            SELECT * FROM prescriptions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(PrescriptionRow::into_domain).transpose()
    }

    async fn apply_status(
        &self,
        prescription_id: Uuid,
        status: PrescriptionStatus,
        tracking_number: Option<&str>,
    ) -> FulfillmentResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            r#"
            UPDATE prescriptions
            SET status = $2,
                tracking_number = COALESCE($3, tracking_number),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(prescription_id)
        .bind(status.as_str())
        .bind(tracking_number)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        // Refresh the denormalized order-progress copy on the payment rows
        // in the same transaction, so the patient page never shows a status
        // the prescription no longer has.
        sqlx::query(
            r#"
            UPDATE payment_transactions
            SET order_status = $2,
                tracking_number = COALESCE($3, tracking_number),
                updated_at = NOW()
            WHERE prescription_id = $1
            "#,
        )
        .bind(prescription_id)
        .bind(status.as_str())
        .bind(tracking_number)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)
    }

    async fn record_submission(
        &self,
        prescription_id: Uuid,
        queue_id: &str,
    ) -> FulfillmentResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            r#"
            UPDATE prescriptions
            SET queue_id = $2,
                status = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(prescription_id)
        .bind(queue_id)
        .bind(PrescriptionStatus::Submitted.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            UPDATE payment_transactions
            SET order_status = $2,
                updated_at = NOW()
            WHERE prescription_id = $1
            "#,
        )
        .bind(prescription_id)
        .bind(PrescriptionStatus::Submitted.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)
    }

    async fn set_payment_status(
        &self,
        prescription_id: Uuid,
        payment_status: PaymentStatus,
    ) -> FulfillmentResult<()> {
        sqlx::query(
            r#"
            UPDATE prescriptions
            SET payment_status = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(prescription_id)
        .bind(payment_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}
