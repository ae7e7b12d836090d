use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::TransitionOutcome;
use crate::status::PrescriptionStatus;

/// A pharmacy status event as received off the wire, status not yet
/// validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub queue_id: String,
    pub new_status: String,
    pub tracking_number: Option<String>,
}

/// Echo of a handled transition, returned to the webhook caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedTransition {
    pub prescription_id: Uuid,
    pub queue_id: String,
    pub previous_status: PrescriptionStatus,
    pub new_status: PrescriptionStatus,
    pub tracking_number: Option<String>,
    pub outcome: TransitionOutcome,
}

/// Result of a submission attempt after payment.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// First hand-off; queue id assigned and status moved to submitted.
    Submitted(AppliedTransition),
    /// The same queue id was already recorded; nothing to do.
    AlreadySubmitted,
}
