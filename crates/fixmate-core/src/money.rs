//! # Money
//!
//! Monetary amounts in major currency units, backed by `rust_decimal`.
//!
//! Every constructor normalizes to two decimal places (midpoint rounds away
//! from zero), so amounts stored and returned at the application boundary are
//! always 2-dp values. The payment processor boundary uses integer minor
//! units: `round(amount × 100)`.

use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::MoneyError;

/// Decimal places kept at the application boundary.
const SCALE: u32 = 2;

/// A monetary amount in major currency units, rounded to 2 decimal places.
///
/// Serializes as a decimal string (`"100.00"`). Deserializes from a JSON
/// number or string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero, at boundary scale.
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Create from a decimal, rounding to 2 dp.
    pub fn new(amount: Decimal) -> Self {
        let mut rounded = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(SCALE);
        Self(rounded)
    }

    /// Create from integer minor units (`1050` → `10.50`).
    pub fn from_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, SCALE))
    }

    /// Convert to integer minor units for the payment processor.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the value does not fit in `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|scaled| scaled.to_i64())
            .ok_or_else(|| MoneyError::Overflow(self.0.to_string()))
    }

    /// Access the underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a rate and round back to 2 dp. Saturates at the
    /// decimal range.
    pub fn apply_rate(&self, rate: Decimal) -> Self {
        Self::new(self.0.saturating_mul(rate))
    }

    /// Addition that reports overflow instead of saturating.
    pub fn checked_add(self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self::new)
    }

    /// Subtraction that reports overflow instead of saturating.
    pub fn checked_sub(self, rhs: Money) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self::new)
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Money) -> Self {
        if rhs >= self {
            Self::ZERO
        } else {
            self - rhs
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self::new(d)
    }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self {
        m.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|_| MoneyError::Invalid(s.to_string()))
    }
}

// `+` and `-` saturate at the decimal range; use `checked_add` and
// `checked_sub` where overflow must be reported.
impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::new(self.0.saturating_sub(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(10.005)).to_string(), "10.01");
        assert_eq!(Money::new(dec!(10.004)).to_string(), "10.00");
        assert_eq!(Money::new(dec!(100)).to_string(), "100.00");
    }

    #[test]
    fn minor_units_conversion() {
        assert_eq!(Money::new(dec!(100.00)).to_minor_units().unwrap(), 10000);
        assert_eq!(Money::new(dec!(0.5)).to_minor_units().unwrap(), 50);
        assert_eq!(Money::from_minor_units(1050), Money::new(dec!(10.50)));
        assert_eq!(Money::from_minor_units(1050).to_string(), "10.50");
    }

    #[test]
    fn deserializes_from_number_and_string() {
        let from_num: Money = serde_json::from_str("120.5").unwrap();
        let from_str: Money = serde_json::from_str("\"120.50\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"120.50\"");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("abc".parse::<Money>().is_err());
        assert_eq!("  7.1 ".parse::<Money>().unwrap().to_string(), "7.10");
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Money::new(dec!(10));
        let b = Money::new(dec!(15));
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::new(dec!(5)));
    }

    #[test]
    fn apply_rate_rounds() {
        let gross = Money::new(dec!(33.33));
        assert_eq!(gross.apply_rate(dec!(0.10)).to_string(), "3.33");
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [dec!(1.10), dec!(2.20), dec!(3.30)]
            .into_iter()
            .map(Money::new)
            .sum();
        assert_eq!(total, Money::new(dec!(6.60)));
    }

    #[test]
    fn minor_units_overflow_is_an_error() {
        let huge: Money = "79228162514264337593543950335".parse().unwrap();
        let err = huge.to_minor_units().unwrap_err();
        assert!(matches!(err, MoneyError::Overflow(_)));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);

        // Fits in a decimal after scaling but not in i64.
        let wide: Money = "100000000000000000000".parse().unwrap();
        assert!(wide.to_minor_units().is_err());
    }

    #[test]
    fn arithmetic_at_the_decimal_range_does_not_panic() {
        let max = Money::new(Decimal::MAX);
        let min = Money::new(Decimal::MIN);
        assert_eq!(max.checked_add(max), None);
        assert_eq!(min.checked_sub(max), None);
        assert!((max + max) >= max);
        assert!((min - max) <= min);
        assert!(max.apply_rate(dec!(2)) >= max);
        assert_eq!(
            Money::new(dec!(1.10)).checked_add(Money::new(dec!(2.20))),
            Some(Money::new(dec!(3.30)))
        );
    }

    proptest! {
        #[test]
        fn minor_units_preserve_value(minor in -1_000_000_000i64..1_000_000_000i64) {
            let m = Money::from_minor_units(minor);
            prop_assert_eq!(m.to_minor_units().unwrap(), minor);
            prop_assert_eq!(Money::new(m.as_decimal()), m);
        }
    }
}
