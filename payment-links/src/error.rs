use thiserror::Error;

use crate::processor::ProcessorError;

/// Payment link error types
#[derive(Error, Debug)]
pub enum PaymentLinkError {
    #[error("Prescription not found")]
    PrescriptionNotFound,

    /// Unknown token. Distinct from [`Self::Expired`]: an expired link once
    /// existed.
    #[error("Payment link not found")]
    NotFound,

    /// The link's expiry has passed. Maps to HTTP 410.
    #[error("Payment link expired")]
    Expired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Pricing(#[from] pricing_engine::PricingError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("Storage backend error: {0}")]
    Storage(String),
}

impl From<fulfillment_engine::FulfillmentError> for PaymentLinkError {
    fn from(err: fulfillment_engine::FulfillmentError) -> Self {
        // The manager only reads and writes prescription rows through the
        // fulfillment store, so anything surfacing here is a storage fault.
        Self::Storage(err.to_string())
    }
}

/// Result type for payment link operations
pub type PaymentLinkResult<T> = Result<T, PaymentLinkError>;
