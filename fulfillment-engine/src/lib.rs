//! Fulfillment Engine - prescription lifecycle state machine for TeleRx Engine
//!
//! This crate owns the prescription status model and the rules for moving
//! between statuses:
//!
//! - The eight-state lifecycle and its forward-only transition graph
//! - Webhook event application with replay detection
//! - Pharmacy-initiated cancellation
//! - Submission hand-off after payment (queue id assignment)
//! - An append-only audit trail of applied, replayed and rejected events
//!
//! Persistence is behind the [`store::FulfillmentStore`] and
//! [`audit::TransitionLog`] traits; [`memory`] provides process-local
//! implementations for tests.

pub mod audit;
pub mod error;
pub mod event;
pub mod machine;
pub mod memory;
pub mod model;
pub mod status;
pub mod store;

pub use audit::{TransitionLog, TransitionOutcome, TransitionRecord, ACTOR_SYSTEM, ACTOR_WEBHOOK};
pub use error::{FulfillmentError, FulfillmentResult};
pub use event::{AppliedTransition, SubmissionOutcome, WebhookEvent};
pub use machine::FulfillmentStateMachine;
pub use memory::{InMemoryFulfillmentStore, InMemoryTransitionLog};
pub use model::{MedicationOrder, Prescription};
pub use status::{
    check_transition, PaymentStatus, PrescriptionStatus, TransitionCheck, WEBHOOK_STATES,
};
pub use store::FulfillmentStore;
