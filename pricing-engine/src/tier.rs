use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider pricing tier
///
/// Tiers are configured per provider organization and carry a percentage
/// discount. The pipeline only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub code: String,
    pub name: String,
    pub discount_percent: Decimal,
}

/// Discount percentage for an optional tier. Providers without a tier get no
/// discount.
pub fn tier_discount(tier: Option<&Tier>) -> Decimal {
    tier.map_or(Decimal::ZERO, |t| t.discount_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gold() -> Tier {
        Tier {
            code: "gold".to_string(),
            name: "Gold".to_string(),
            discount_percent: dec!(10),
        }
    }

    #[test]
    fn discount_defaults_to_zero_without_tier() {
        assert_eq!(tier_discount(None), Decimal::ZERO);
    }

    #[test]
    fn discount_comes_from_tier() {
        assert_eq!(tier_discount(Some(&gold())), dec!(10));
    }
}
