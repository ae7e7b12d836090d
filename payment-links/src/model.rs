use chrono::{DateTime, Utc};
use fulfillment_engine::PrescriptionStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored lifecycle of a payment transaction.
///
/// Expiry is never a stored state. Expired pending rows are deleted, by the
/// sweeper or lazily before a replacement link is minted, so stale tokens
/// stop resolving instead of lingering as dead rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment attempt for a prescription, backing one hosted link.
///
/// At most one pending transaction exists per prescription at any time.
/// `order_status` and `tracking_number` are denormalized copies of the
/// prescription's progress, refreshed in the same write that updates the
/// prescription, so the patient page stays current without joining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub prescription_id: Uuid,
    /// Opaque bearer token embedded in the patient-facing link.
    pub token: String,
    pub hosted_url: String,
    /// Medication summary snapshot taken at link creation.
    pub description: String,
    pub consultation_fee: Decimal,
    pub medication_cost: Decimal,
    pub total_amount: Decimal,
    /// Margin snapshot for reporting.
    pub profit: Decimal,
    pub status: TransactionStatus,
    pub processor_ref: Option<String>,
    pub order_status: PrescriptionStatus,
    pub tracking_number: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Whether this row should be treated as dead at `now`. Paid
    /// transactions never expire; the patient keeps access to the receipt
    /// and order progress.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::Pending && now >= self.expires_at
    }
}

/// What a caller needs to hand the patient a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub token: String,
    pub url: String,
    pub amount_cents: i64,
    pub amount_display: String,
    pub description: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a get-or-create call.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// The prescription is already paid; no link is issued.
    AlreadyPaid,
    /// An unexpired pending link already existed; returned unchanged.
    Existing(PaymentLink),
    /// A fresh link was minted and persisted.
    Created(PaymentLink),
}

impl LinkOutcome {
    pub fn link(&self) -> Option<&PaymentLink> {
        match self {
            Self::AlreadyPaid => None,
            Self::Existing(link) | Self::Created(link) => Some(link),
        }
    }
}

/// Outcome of applying a processor payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// First confirmation for this transaction. The prescription is now
    /// paid and ready for pharmacy submission.
    Applied { prescription_id: Uuid },
    /// Duplicate confirmation; nothing changed and nothing downstream
    /// should fire again.
    AlreadyApplied,
}

/// Sanitized patient-facing view of a payment and its order progress.
///
/// Resolved by bearer token without a session, so it carries display fields
/// only and no internal identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub description: String,
    pub patient_name: String,
    pub provider_name: String,
    pub consultation_fee_cents: i64,
    pub medication_cost_cents: i64,
    pub total_cents: i64,
    pub total_display: String,
    pub paid: bool,
    pub order_status: PrescriptionStatus,
    pub tracking_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn transaction(status: TransactionStatus, expires_in: Duration) -> PaymentTransaction {
        let now = Utc::now();
        PaymentTransaction {
            id: Uuid::new_v4(),
            prescription_id: Uuid::new_v4(),
            token: "tok_test".to_string(),
            hosted_url: "https://pay.test/tok_test".to_string(),
            description: "Amoxicillin 500mg x 30".to_string(),
            consultation_fee: Decimal::new(4000, 2),
            medication_cost: Decimal::new(1250, 2),
            total_amount: Decimal::new(5250, 2),
            profit: Decimal::ZERO,
            status,
            processor_ref: None,
            order_status: PrescriptionStatus::PendingPayment,
            tracking_number: None,
            expires_at: now + expires_in,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_transaction_expires() {
        let now = Utc::now();
        assert!(transaction(TransactionStatus::Pending, Duration::minutes(-1)).is_expired(now));
        assert!(!transaction(TransactionStatus::Pending, Duration::minutes(30)).is_expired(now));
    }

    #[test]
    fn paid_transaction_never_expires() {
        let now = Utc::now();
        assert!(!transaction(TransactionStatus::Paid, Duration::minutes(-90)).is_expired(now));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(TransactionStatus::parse("Paid"), Some(TransactionStatus::Paid));
        assert_eq!(TransactionStatus::parse("pending"), Some(TransactionStatus::Pending));
        assert_eq!(TransactionStatus::parse("expired"), None);
    }
}
