//! Pricing policy for patient-facing medication charges.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};

/// Priced medication line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationQuote {
    /// What the pharmacy charges us for the medication.
    pub pharmacy_cost: Decimal,
    /// What the patient is charged.
    pub patient_price: Decimal,
}

/// Price a medication from its pharmacy acquisition cost.
///
/// Patient price currently tracks acquisition cost one-to-one; tier discounts
/// are computed for reporting but not yet applied to the charge amount.
/// Negative costs are rejected.
pub fn final_price(acquisition_cost: Decimal) -> PricingResult<MedicationQuote> {
    if acquisition_cost < Decimal::ZERO {
        return Err(PricingError::InvalidInput(format!(
            "negative acquisition cost: {acquisition_cost}"
        )));
    }
    Ok(MedicationQuote {
        pharmacy_cost: acquisition_cost,
        patient_price: acquisition_cost,
    })
}

/// Margin on a charge, rounded to cents half-away-from-zero. Negative when
/// the charge is below cost.
pub fn profit(patient_price: Decimal, acquisition_cost: Decimal) -> Decimal {
    (patient_price - acquisition_cost)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn patient_price_tracks_acquisition_cost() {
        let quote = final_price(dec!(12.50)).unwrap();
        assert_eq!(quote.pharmacy_cost, dec!(12.50));
        assert_eq!(quote.patient_price, dec!(12.50));
    }

    #[test]
    fn zero_cost_is_allowed() {
        let quote = final_price(Decimal::ZERO).unwrap();
        assert_eq!(quote.patient_price, Decimal::ZERO);
    }

    #[test]
    fn negative_cost_is_rejected() {
        assert!(matches!(
            final_price(dec!(-0.01)),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn profit_subtracts_cost_from_price() {
        assert_eq!(profit(dec!(19.99), dec!(12.50)), dec!(7.49));
    }

    #[test]
    fn profit_rounds_half_cents_away_from_zero() {
        assert_eq!(profit(dec!(10.005), dec!(0)), dec!(10.01));
        assert_eq!(profit(dec!(0), dec!(10.005)), dec!(-10.01));
        assert_eq!(profit(dec!(1.004), dec!(0)), dec!(1.00));
        assert_eq!(profit(dec!(0), dec!(1.004)), dec!(-1.00));
    }

    #[test]
    fn profit_can_be_negative() {
        assert_eq!(profit(dec!(10.00), dec!(12.50)), dec!(-2.50));
    }
}
