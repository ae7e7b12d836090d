//! The fulfillment state machine.
//!
//! Applies pharmacy webhook events, pharmacy-initiated cancellations and
//! system-initiated submission against the transition graph in
//! [`crate::status`]. Every event that reaches a prescription is appended to
//! the transition log, whether it was applied, replayed or rejected.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{TransitionLog, TransitionOutcome, TransitionRecord, ACTOR_SYSTEM, ACTOR_WEBHOOK};
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::event::{AppliedTransition, SubmissionOutcome, WebhookEvent};
use crate::status::{check_transition, PrescriptionStatus, TransitionCheck};
use crate::store::FulfillmentStore;

/// Drives prescription status changes against the transition graph.
pub struct FulfillmentStateMachine {
    store: Arc<dyn FulfillmentStore>,
    log: Arc<dyn TransitionLog>,
}

impl FulfillmentStateMachine {
    pub fn new(store: Arc<dyn FulfillmentStore>, log: Arc<dyn TransitionLog>) -> Self {
        Self { store, log }
    }

    /// Apply a pharmacy status webhook event.
    ///
    /// Validation happens before any lookup: a status outside the six
    /// webhook states never touches storage. Replays of the current status
    /// re-persist the same value and acknowledge; edges missing from the
    /// graph are rejected with the attempt kept in the audit log.
    pub async fn apply_webhook_event(
        &self,
        event: &WebhookEvent,
    ) -> FulfillmentResult<AppliedTransition> {
        let requested = PrescriptionStatus::parse_webhook(&event.new_status)
            .ok_or_else(|| FulfillmentError::InvalidStatus(event.new_status.clone()))?;

        let prescription = self
            .store
            .find_by_queue_id(&event.queue_id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;

        let previous = prescription.status;

        // Tracking numbers ride along only on shipped events.
        let tracking = if requested == PrescriptionStatus::Shipped {
            event.tracking_number.as_deref()
        } else {
            None
        };

        match check_transition(previous, requested) {
            TransitionCheck::Allowed => {
                self.store
                    .apply_status(prescription.id, requested, tracking)
                    .await?;
                self.append(
                    prescription.id,
                    Some(&event.queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Applied,
                    tracking,
                    None,
                )
                .await?;
                info!(
                    queue_id = %event.queue_id,
                    from = %previous,
                    to = %requested,
                    "fulfillment status applied"
                );
                Ok(AppliedTransition {
                    prescription_id: prescription.id,
                    queue_id: event.queue_id.clone(),
                    previous_status: previous,
                    new_status: requested,
                    tracking_number: tracking.map(str::to_string),
                    outcome: TransitionOutcome::Applied,
                })
            }
            TransitionCheck::Replay => {
                self.store
                    .apply_status(prescription.id, requested, tracking)
                    .await?;
                self.append(
                    prescription.id,
                    Some(&event.queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Replayed,
                    tracking,
                    None,
                )
                .await?;
                info!(
                    queue_id = %event.queue_id,
                    status = %requested,
                    "fulfillment status replayed"
                );
                Ok(AppliedTransition {
                    prescription_id: prescription.id,
                    queue_id: event.queue_id.clone(),
                    previous_status: previous,
                    new_status: requested,
                    tracking_number: tracking.map(str::to_string),
                    outcome: TransitionOutcome::Replayed,
                })
            }
            TransitionCheck::Rejected => {
                // Keep the attempt for operator review, leave the status
                // untouched.
                self.append(
                    prescription.id,
                    Some(&event.queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Rejected,
                    tracking,
                    None,
                )
                .await?;
                warn!(
                    queue_id = %event.queue_id,
                    from = %previous,
                    to = %requested,
                    "rejected fulfillment transition"
                );
                Err(FulfillmentError::InvalidTransition {
                    from: previous,
                    to: requested,
                })
            }
        }
    }

    /// Apply a pharmacy-initiated cancellation.
    ///
    /// Allowed from any non-terminal state; cancelling an already-cancelled
    /// prescription is an acknowledged replay.
    pub async fn apply_cancellation(
        &self,
        queue_id: &str,
        reason: Option<&str>,
    ) -> FulfillmentResult<AppliedTransition> {
        let prescription = self
            .store
            .find_by_queue_id(queue_id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;

        let previous = prescription.status;
        let requested = PrescriptionStatus::Cancelled;

        match check_transition(previous, requested) {
            TransitionCheck::Allowed => {
                self.store
                    .apply_status(prescription.id, requested, None)
                    .await?;
                self.append(
                    prescription.id,
                    Some(queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Applied,
                    None,
                    reason,
                )
                .await?;
                info!(queue_id = %queue_id, from = %previous, "prescription cancelled");
                Ok(AppliedTransition {
                    prescription_id: prescription.id,
                    queue_id: queue_id.to_string(),
                    previous_status: previous,
                    new_status: requested,
                    tracking_number: None,
                    outcome: TransitionOutcome::Applied,
                })
            }
            TransitionCheck::Replay => {
                self.append(
                    prescription.id,
                    Some(queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Replayed,
                    None,
                    reason,
                )
                .await?;
                Ok(AppliedTransition {
                    prescription_id: prescription.id,
                    queue_id: queue_id.to_string(),
                    previous_status: previous,
                    new_status: requested,
                    tracking_number: None,
                    outcome: TransitionOutcome::Replayed,
                })
            }
            TransitionCheck::Rejected => {
                self.append(
                    prescription.id,
                    Some(queue_id),
                    ACTOR_WEBHOOK,
                    previous,
                    requested,
                    TransitionOutcome::Rejected,
                    None,
                    reason,
                )
                .await?;
                warn!(queue_id = %queue_id, from = %previous, "rejected cancellation of terminal prescription");
                Err(FulfillmentError::InvalidTransition {
                    from: previous,
                    to: requested,
                })
            }
        }
    }

    /// Record the hand-off to the pharmacy after payment: assign the queue id
    /// and move `pending_payment → submitted`.
    ///
    /// Re-running with the queue id already assigned is a no-op, which keeps
    /// payment-webhook retries harmless.
    pub async fn mark_submitted(
        &self,
        prescription_id: Uuid,
        queue_id: &str,
    ) -> FulfillmentResult<SubmissionOutcome> {
        let prescription = self
            .store
            .find_by_id(prescription_id)
            .await?
            .ok_or(FulfillmentError::NotFound)?;

        if let Some(existing) = &prescription.queue_id {
            if existing == queue_id {
                return Ok(SubmissionOutcome::AlreadySubmitted);
            }
            return Err(FulfillmentError::QueueConflict {
                existing: existing.clone(),
            });
        }

        let previous = prescription.status;
        if previous != PrescriptionStatus::PendingPayment {
            return Err(FulfillmentError::InvalidTransition {
                from: previous,
                to: PrescriptionStatus::Submitted,
            });
        }

        self.store
            .record_submission(prescription_id, queue_id)
            .await?;
        self.append(
            prescription_id,
            Some(queue_id),
            ACTOR_SYSTEM,
            previous,
            PrescriptionStatus::Submitted,
            TransitionOutcome::Applied,
            None,
            None,
        )
        .await?;
        info!(prescription_id = %prescription_id, queue_id = %queue_id, "prescription submitted to pharmacy");

        Ok(SubmissionOutcome::Submitted(AppliedTransition {
            prescription_id,
            queue_id: queue_id.to_string(),
            previous_status: previous,
            new_status: PrescriptionStatus::Submitted,
            tracking_number: None,
            outcome: TransitionOutcome::Applied,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    async fn append(
        &self,
        prescription_id: Uuid,
        queue_id: Option<&str>,
        actor: &str,
        previous: PrescriptionStatus,
        requested: PrescriptionStatus,
        outcome: TransitionOutcome,
        tracking_number: Option<&str>,
        note: Option<&str>,
    ) -> FulfillmentResult<()> {
        self.log
            .record(&TransitionRecord {
                prescription_id,
                queue_id: queue_id.map(str::to_string),
                actor: actor.to_string(),
                previous_status: previous,
                requested_status: requested,
                outcome,
                tracking_number: tracking_number.map(str::to_string),
                note: note.map(str::to_string),
                occurred_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TransitionLog;
    use crate::memory::{InMemoryFulfillmentStore, InMemoryTransitionLog};
    use crate::model::{MedicationOrder, Prescription};
    use crate::status::PaymentStatus;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn prescription(status: PrescriptionStatus, queue_id: Option<&str>) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            pharmacy_id: Uuid::new_v4(),
            patient_name: "Ada Lovelace".to_string(),
            provider_name: "Dr. Byron".to_string(),
            medication: MedicationOrder {
                name: "Amoxicillin".to_string(),
                strength: "500mg".to_string(),
                quantity: 30,
                refills: 0,
                instructions: None,
            },
            acquisition_cost: dec!(12.50),
            consultation_fee: dec!(40.00),
            queue_id: queue_id.map(str::to_string),
            status,
            payment_status: PaymentStatus::Unpaid,
            tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn machine() -> (
        FulfillmentStateMachine,
        Arc<InMemoryFulfillmentStore>,
        Arc<InMemoryTransitionLog>,
    ) {
        let store = Arc::new(InMemoryFulfillmentStore::new());
        let log = Arc::new(InMemoryTransitionLog::new());
        let machine = FulfillmentStateMachine::new(store.clone(), log.clone());
        (machine, store, log)
    }

    fn event(queue_id: &str, status: &str, tracking: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            queue_id: queue_id.to_string(),
            new_status: status.to_string(),
            tracking_number: tracking.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn applies_forward_transition_and_audits_it() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::Submitted, Some("Q-100"));
        let rx_id = rx.id;
        store.insert(rx).await;

        let applied = machine
            .apply_webhook_event(&event("Q-100", "billing", None))
            .await
            .unwrap();

        assert_eq!(applied.previous_status, PrescriptionStatus::Submitted);
        assert_eq!(applied.new_status, PrescriptionStatus::Billing);
        assert_eq!(applied.outcome, TransitionOutcome::Applied);

        let stored = store.get(rx_id).await.unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Billing);

        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, ACTOR_WEBHOOK);
        assert_eq!(entries[0].outcome, TransitionOutcome::Applied);
        assert_eq!(entries[0].queue_id.as_deref(), Some("Q-100"));
    }

    #[tokio::test]
    async fn status_is_validated_case_insensitively() {
        let (machine, store, _log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Submitted, Some("Q-101")))
            .await;

        let applied = machine
            .apply_webhook_event(&event("Q-101", "BILLING", None))
            .await
            .unwrap();
        assert_eq!(applied.new_status, PrescriptionStatus::Billing);
    }

    #[tokio::test]
    async fn unknown_status_is_rejected_before_lookup() {
        let (machine, store, log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Submitted, Some("Q-102")))
            .await;

        let err = machine
            .apply_webhook_event(&event("Q-102", "teleported", None))
            .await
            .unwrap_err();
        assert_eq!(err, FulfillmentError::InvalidStatus("teleported".to_string()));

        // nothing touched, nothing logged
        let stored = store.find_by_queue_id("Q-102").await.unwrap().unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Submitted);
        assert!(log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_is_not_a_webhook_status() {
        let (machine, store, _log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Submitted, Some("Q-103")))
            .await;

        let err = machine
            .apply_webhook_event(&event("Q-103", "cancelled", None))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn unknown_queue_id_is_not_found() {
        let (machine, _store, log) = machine();

        let err = machine
            .apply_webhook_event(&event("Q-404", "billing", None))
            .await
            .unwrap_err();
        assert_eq!(err, FulfillmentError::NotFound);
        assert!(log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn backward_transition_is_rejected_but_audited() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::Approved, Some("Q-104"));
        let rx_id = rx.id;
        store.insert(rx).await;

        let err = machine
            .apply_webhook_event(&event("Q-104", "submitted", None))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FulfillmentError::InvalidTransition {
                from: PrescriptionStatus::Approved,
                to: PrescriptionStatus::Submitted,
            }
        );

        // status untouched, attempt recorded for operator review
        assert_eq!(store.get(rx_id).await.unwrap().status, PrescriptionStatus::Approved);
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, TransitionOutcome::Rejected);
        assert_eq!(entries[0].requested_status, PrescriptionStatus::Submitted);
    }

    #[tokio::test]
    async fn replay_is_a_no_op_but_still_audited() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::Billing, Some("Q-105"));
        let rx_id = rx.id;
        store.insert(rx).await;

        let applied = machine
            .apply_webhook_event(&event("Q-105", "billing", None))
            .await
            .unwrap();
        assert_eq!(applied.outcome, TransitionOutcome::Replayed);

        assert_eq!(store.get(rx_id).await.unwrap().status, PrescriptionStatus::Billing);
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, TransitionOutcome::Replayed);
    }

    #[tokio::test]
    async fn forward_skip_is_applied() {
        let (machine, store, _log) = machine();
        let rx = prescription(PrescriptionStatus::Submitted, Some("Q-106"));
        let rx_id = rx.id;
        store.insert(rx).await;

        machine
            .apply_webhook_event(&event("Q-106", "shipped", Some("1Z999AA10123456784")))
            .await
            .unwrap();

        let stored = store.get(rx_id).await.unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Shipped);
        assert_eq!(stored.tracking_number.as_deref(), Some("1Z999AA10123456784"));
    }

    #[tokio::test]
    async fn tracking_is_only_stored_on_shipped() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::Submitted, Some("Q-107"));
        let rx_id = rx.id;
        store.insert(rx).await;

        machine
            .apply_webhook_event(&event("Q-107", "billing", Some("1Z999AA10123456784")))
            .await
            .unwrap();

        let stored = store.get(rx_id).await.unwrap();
        assert_eq!(stored.tracking_number, None);
        assert_eq!(log.entries().await[0].tracking_number, None);
    }

    #[tokio::test]
    async fn shipped_without_tracking_still_applies() {
        let (machine, store, _log) = machine();
        let rx = prescription(PrescriptionStatus::Packed, Some("Q-108"));
        let rx_id = rx.id;
        store.insert(rx).await;

        machine
            .apply_webhook_event(&event("Q-108", "shipped", None))
            .await
            .unwrap();

        let stored = store.get(rx_id).await.unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Shipped);
        assert_eq!(stored.tracking_number, None);
    }

    #[tokio::test]
    async fn delivered_is_terminal() {
        let (machine, store, log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Delivered, Some("Q-109")))
            .await;

        let err = machine
            .apply_webhook_event(&event("Q-109", "shipped", None))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));
        assert_eq!(log.entries().await[0].outcome, TransitionOutcome::Rejected);
    }

    #[tokio::test]
    async fn cancellation_applies_from_non_terminal_states() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::Billing, Some("Q-110"));
        let rx_id = rx.id;
        store.insert(rx).await;

        let applied = machine
            .apply_cancellation("Q-110", Some("patient request"))
            .await
            .unwrap();
        assert_eq!(applied.new_status, PrescriptionStatus::Cancelled);

        assert_eq!(store.get(rx_id).await.unwrap().status, PrescriptionStatus::Cancelled);
        let entries = log.entries().await;
        assert_eq!(entries[0].note.as_deref(), Some("patient request"));
    }

    #[tokio::test]
    async fn cancelling_delivered_prescription_is_rejected() {
        let (machine, store, _log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Delivered, Some("Q-111")))
            .await;

        let err = machine.apply_cancellation("Q-111", None).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn repeated_cancellation_is_a_replay() {
        let (machine, store, log) = machine();
        store
            .insert(prescription(PrescriptionStatus::Cancelled, Some("Q-112")))
            .await;

        let applied = machine.apply_cancellation("Q-112", None).await.unwrap();
        assert_eq!(applied.outcome, TransitionOutcome::Replayed);
        assert_eq!(log.entries().await[0].outcome, TransitionOutcome::Replayed);
    }

    #[tokio::test]
    async fn submission_assigns_queue_id_once() {
        let (machine, store, log) = machine();
        let rx = prescription(PrescriptionStatus::PendingPayment, None);
        let rx_id = rx.id;
        store.insert(rx).await;

        let outcome = machine.mark_submitted(rx_id, "Q-200").await.unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Submitted(_)));

        let stored = store.get(rx_id).await.unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Submitted);
        assert_eq!(stored.queue_id.as_deref(), Some("Q-200"));
        assert_eq!(log.entries().await[0].actor, ACTOR_SYSTEM);

        // retry with the same queue id is harmless
        let again = machine.mark_submitted(rx_id, "Q-200").await.unwrap();
        assert!(matches!(again, SubmissionOutcome::AlreadySubmitted));
        assert_eq!(log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn submission_with_conflicting_queue_id_fails() {
        let (machine, store, _log) = machine();
        let rx = prescription(PrescriptionStatus::Submitted, Some("Q-201"));
        let rx_id = rx.id;
        store.insert(rx).await;

        let err = machine.mark_submitted(rx_id, "Q-999").await.unwrap_err();
        assert_eq!(
            err,
            FulfillmentError::QueueConflict {
                existing: "Q-201".to_string()
            }
        );
    }

    #[tokio::test]
    async fn submission_of_cancelled_prescription_fails() {
        let (machine, store, _log) = machine();
        let rx = prescription(PrescriptionStatus::Cancelled, None);
        let rx_id = rx.id;
        store.insert(rx).await;

        let err = machine.mark_submitted(rx_id, "Q-202").await.unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));
    }

    struct FailingLog;

    #[async_trait]
    impl TransitionLog for FailingLog {
        async fn record(&self, _entry: &TransitionRecord) -> FulfillmentResult<()> {
            Err(FulfillmentError::Storage("audit sink down".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_audit_append_fails_the_event() {
        let store = Arc::new(InMemoryFulfillmentStore::new());
        store
            .insert(prescription(PrescriptionStatus::Submitted, Some("Q-300")))
            .await;
        let machine = FulfillmentStateMachine::new(store, Arc::new(FailingLog));

        let err = machine
            .apply_webhook_event(&event("Q-300", "billing", None))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Storage(_)));
    }
}
