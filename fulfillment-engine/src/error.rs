use thiserror::Error;

use crate::status::PrescriptionStatus;

/// Fulfillment error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("Prescription not found")]
    NotFound,

    /// The supplied status is not one of the webhook states.
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    /// The requested edge is not in the transition graph.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PrescriptionStatus,
        to: PrescriptionStatus,
    },

    /// A different queue id is already assigned to this prescription.
    #[error("Prescription already submitted under queue id {existing}")]
    QueueConflict { existing: String },

    #[error("Storage backend error: {0}")]
    Storage(String),
}

/// Result type for fulfillment operations
pub type FulfillmentResult<T> = Result<T, FulfillmentError>;
