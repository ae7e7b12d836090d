//! Exact conversions between decimal dollars and integer cents.
//!
//! Monetary values move through the pipeline as [`Decimal`] dollars and are
//! persisted as integer cents. Conversions are exact for every two-decimal
//! dollar amount; inputs carrying sub-cent precision are rejected rather than
//! silently rounded, since every producer upstream already rounds to cents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{PricingError, PricingResult};

/// Convert integer cents to decimal dollars. Exact for the full `i64` range.
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Convert decimal dollars to integer cents.
///
/// Returns `InvalidInput` when the amount carries sub-cent precision or does
/// not fit in an `i64` cent count.
pub fn dollars_to_cents(amount: Decimal) -> PricingResult<i64> {
    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| PricingError::InvalidInput(format!("amount out of range: {amount}")))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(PricingError::InvalidInput(format!(
            "sub-cent precision: {amount}"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| PricingError::InvalidInput(format!("amount out of range: {amount}")))
}

/// Format a dollar amount for display, always with two decimal places.
pub fn format_usd(amount: Decimal) -> String {
    format!("${amount:.2}")
}
