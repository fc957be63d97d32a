//! Currency rounding service.
//!
//! Residual comparisons throughout the matching engine go through a
//! statement line's currency, so "equal" always means "equal at that
//! currency's precision".

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub decimal_places: u32,
}

impl Currency {
    pub fn new(code: impl Into<String>, decimal_places: u32) -> Self {
        Self {
            code: code.into(),
            decimal_places,
        }
    }

    /// Round half away from zero at this currency's precision.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimal_places, RoundingStrategy::MidpointAwayFromZero)
    }

    /// True when the amount rounds to zero at this currency's precision.
    pub fn is_zero(&self, amount: Decimal) -> bool {
        self.round(amount).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn eur() -> Currency {
        Currency::new("EUR", 2)
    }

    #[test]
    fn round_half_away_from_zero() {
        let c = eur();
        assert_eq!(c.round(Decimal::from_str("1.005").unwrap()), Decimal::from_str("1.01").unwrap());
        assert_eq!(c.round(Decimal::from_str("-1.005").unwrap()), Decimal::from_str("-1.01").unwrap());
    }

    #[test]
    fn is_zero_at_currency_precision() {
        let c = eur();
        assert!(c.is_zero(Decimal::from_str("0.001").unwrap()));
        assert!(!c.is_zero(Decimal::from_str("0.01").unwrap()));
    }

    #[test]
    fn zero_decimal_currency_rounds_to_units() {
        let jpy = Currency::new("JPY", 0);
        assert_eq!(jpy.round(Decimal::from_str("100.4").unwrap()), Decimal::from(100));
        assert!(jpy.is_zero(Decimal::from_str("0.4").unwrap()));
    }
}
