use async_trait::async_trait;
use uuid::Uuid;

use crate::error::FulfillmentResult;
use crate::model::Prescription;
use crate::status::{PaymentStatus, PrescriptionStatus};

/// Persistence interface for the fulfillment pipeline.
///
/// The state machine only ever talks to this trait; the server provides the
/// Postgres implementation and [`crate::memory`] a process-local one.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    async fn find_by_queue_id(&self, queue_id: &str) -> FulfillmentResult<Option<Prescription>>;

    async fn find_by_id(&self, id: Uuid) -> FulfillmentResult<Option<Prescription>>;

    /// Persist a status change. `tracking_number` is only ever passed for
    /// shipped events. Implementations also refresh any denormalized
    /// order-progress copies (the patient-facing payment row) in the same
    /// write.
    async fn apply_status(
        &self,
        prescription_id: Uuid,
        status: PrescriptionStatus,
        tracking_number: Option<&str>,
    ) -> FulfillmentResult<()>;

    /// Assign the pharmacy queue id and move `pending_payment → submitted`
    /// in one write.
    async fn record_submission(
        &self,
        prescription_id: Uuid,
        queue_id: &str,
    ) -> FulfillmentResult<()>;

    async fn set_payment_status(
        &self,
        prescription_id: Uuid,
        payment_status: PaymentStatus,
    ) -> FulfillmentResult<()>;
}
