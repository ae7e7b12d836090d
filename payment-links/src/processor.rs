//! Interface to the external payment processor.
//!
//! The manager only ever needs one capability: mint a hosted checkout page
//! with an unguessable bearer token. The server provides the HTTP
//! implementation; tests substitute fakes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// What the processor needs to mint a hosted link.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedLinkRequest {
    /// Correlation id passed through to the processor for reconciliation.
    pub reference: Uuid,
    pub amount: Decimal,
    pub description: String,
}

/// A minted hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedLink {
    /// Opaque bearer token; also keys the patient-facing resolution route.
    pub token: String,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Timeout or 5xx from the processor. Transient; the caller may retry.
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),

    /// The processor refused the request. Retrying will not help.
    #[error("Payment processor rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_hosted_link(
        &self,
        request: &HostedLinkRequest,
    ) -> Result<HostedLink, ProcessorError>;
}
