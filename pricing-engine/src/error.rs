use thiserror::Error;

/// Pricing error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Invalid pricing input: {0}")]
    InvalidInput(String),
}

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;
