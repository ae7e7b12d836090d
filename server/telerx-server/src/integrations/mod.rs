//! HTTP clients for external systems: the payment processor and the
//! pharmacy fulfillment backends.

pub mod pharmacy;
pub mod processor;

pub use pharmacy::{PharmacyClient, SubmitError};
pub use processor::HttpPaymentProcessor;
