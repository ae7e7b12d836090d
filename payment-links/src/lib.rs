//! Payment Links - hosted payment link lifecycle for TeleRx Engine
//!
//! This crate owns the payment side of the prescription pipeline:
//!
//! - Idempotent link issuance (one pending transaction per prescription,
//!   claimed with a conditional insert)
//! - Expiry as deletion: expired pending rows are removed, by the sweeper
//!   or lazily before reissue, and expiry is re-checked at read time
//! - Token resolution into sanitized patient-facing details
//! - Processor confirmation handling with duplicate-delivery tolerance
//!
//! The payment processor sits behind [`processor::PaymentProcessor`] and
//! persistence behind [`store::PaymentTransactionStore`]; the server wires
//! the HTTP and Postgres implementations, [`memory`] the test ones.

pub mod error;
pub mod manager;
pub mod memory;
pub mod model;
pub mod processor;
pub mod store;
pub mod sweeper;

pub use error::{PaymentLinkError, PaymentLinkResult};
pub use manager::PaymentLinkManager;
pub use memory::{InMemoryPaymentStore, InMemoryTierStore};
pub use model::{
    LinkOutcome, PaymentDetails, PaymentLink, PaymentOutcome, PaymentTransaction,
    TransactionStatus,
};
pub use processor::{HostedLink, HostedLinkRequest, PaymentProcessor, ProcessorError};
pub use store::{InsertOutcome, NewPaymentTransaction, PaymentTransactionStore, TierStore};
pub use sweeper::ExpirySweeper;
