use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment_engine::PrescriptionStatus;
use pricing_engine::Tier;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::PaymentLinkResult;
use crate::model::PaymentTransaction;

/// Fields for persisting a freshly minted payment link. The store assigns
/// the row id and timestamps.
#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub prescription_id: Uuid,
    pub token: String,
    pub hosted_url: String,
    pub description: String,
    pub consultation_fee: Decimal,
    pub medication_cost: Decimal,
    pub total_amount: Decimal,
    pub profit: Decimal,
    /// Order-progress snapshot at creation time.
    pub order_status: PrescriptionStatus,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of the conditional pending insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// This caller's row was written.
    Inserted(PaymentTransaction),
    /// A pending row for the prescription already existed; the stored row
    /// is returned so the caller can hand out the winning link.
    Existing(PaymentTransaction),
}

/// Persistence interface for payment transactions.
///
/// The server backs this with Postgres; [`crate::memory`] provides a
/// process-local implementation for tests.
#[async_trait]
pub trait PaymentTransactionStore: Send + Sync {
    async fn find_pending_for_prescription(
        &self,
        prescription_id: Uuid,
    ) -> PaymentLinkResult<Option<PaymentTransaction>>;

    /// Insert a pending transaction unless one already exists for the
    /// prescription, as one conditional write. Two concurrent callers must
    /// both end up holding the same row: one `Inserted`, one `Existing`.
    async fn insert_pending_if_absent(
        &self,
        transaction: NewPaymentTransaction,
    ) -> PaymentLinkResult<InsertOutcome>;

    /// Delete a transaction only if it is pending and expired at `now`.
    /// Returns `false` when the row is gone or no longer qualifies.
    async fn delete_if_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> PaymentLinkResult<bool>;

    async fn find_by_token(&self, token: &str) -> PaymentLinkResult<Option<PaymentTransaction>>;

    /// Flip `pending → paid` in one conditional update. Returns the updated
    /// row, or `None` when no pending row matches the token (unknown token
    /// or already paid).
    async fn mark_paid(
        &self,
        token: &str,
        processor_ref: &str,
        paid_at: DateTime<Utc>,
    ) -> PaymentLinkResult<Option<PaymentTransaction>>;

    /// Delete every pending transaction whose expiry has passed. Returns the
    /// number of rows removed.
    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> PaymentLinkResult<u64>;
}

/// Read access to provider pricing tiers.
#[async_trait]
pub trait TierStore: Send + Sync {
    async fn find_for_provider(&self, provider_id: Uuid) -> PaymentLinkResult<Option<Tier>>;
}
