//! Append-only audit log of fulfillment transitions.
//!
//! Every event that reaches a prescription leaves a record: applied moves,
//! replays and rejected edges alike. Rejections are kept for operator review
//! instead of being dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FulfillmentResult;
use crate::status::PrescriptionStatus;

/// Actor value for pharmacy-originated events.
pub const ACTOR_WEBHOOK: &str = "webhook";
/// Actor value for pipeline-originated events (e.g. submission after payment).
pub const ACTOR_SYSTEM: &str = "system";

/// How an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied,
    Replayed,
    Rejected,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Replayed => "replayed",
            Self::Rejected => "rejected",
        }
    }
}

/// One appended audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub prescription_id: Uuid,
    pub queue_id: Option<String>,
    pub actor: String,
    pub previous_status: PrescriptionStatus,
    pub requested_status: PrescriptionStatus,
    pub outcome: TransitionOutcome,
    pub tracking_number: Option<String>,
    /// Free-form context, e.g. a cancellation reason.
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Append-only sink for transition records. Appends must never be skipped;
/// implementations fail the surrounding operation when the write fails.
#[async_trait]
pub trait TransitionLog: Send + Sync {
    async fn record(&self, entry: &TransitionRecord) -> FulfillmentResult<()>;
}
