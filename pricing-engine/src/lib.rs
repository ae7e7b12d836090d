//! Pricing Engine - medication pricing and money math for TeleRx Engine
//!
//! This crate provides the pure pricing functions used by the payment
//! pipeline:
//!
//! - Exact conversions between decimal dollars and integer cents
//! - Patient price computation from pharmacy acquisition cost
//! - Provider tier discounts
//! - Profit computation with half-away-from-zero cent rounding
//!
//! Everything here is deterministic and free of I/O so it can be exercised
//! directly in unit tests.

pub mod error;
pub mod money;
pub mod policy;
pub mod tier;

pub use error::{PricingError, PricingResult};
pub use money::{cents_to_dollars, dollars_to_cents, format_usd};
pub use policy::{final_price, profit, MedicationQuote};
pub use tier::{tier_discount, Tier};
