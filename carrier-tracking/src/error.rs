use thiserror::Error;

/// Carrier integration error types
///
/// Transport failures never reach pipeline callers; the client degrades
/// them to `None` after logging. The type exists so transport
/// implementations can report what went wrong.
#[derive(Error, Debug)]
pub enum CarrierError {
    #[error("Carrier request failed: {0}")]
    Transport(String),
}

/// Result type for carrier transport operations
pub type CarrierResult<T> = Result<T, CarrierError>;
