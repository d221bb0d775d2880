use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use crate::errors::{LendingError, Result};

/// fractional digits carried by every monetary value
pub const MONEY_DP: u32 = 2;

/// quantize to cents, rounding half away from zero
pub fn quantize(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Money type with exactly 2 decimal places, rounded half-up at every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

    /// create from decimal, quantized to cents
    pub fn from_decimal(d: Decimal) -> Self {
        let mut q = quantize(d);
        q.rescale(MONEY_DP);
        Money(q)
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> std::result::Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s)?))
    }

    /// parse user-entered amounts such as "18,500.50"
    ///
    /// Thousands separators and surrounding whitespace are ignored. Anything
    /// that is not a finite decimal fails with `InvalidAmount`.
    pub fn parse_amount(input: &str) -> Result<Decimal> {
        let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Err(LendingError::InvalidAmount {
                input: input.to_string(),
            });
        }
        Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map_err(|_| LendingError::InvalidAmount {
                input: input.to_string(),
            })
    }

    /// create from integer amount (pesos, dollars, etc)
    pub fn from_major(amount: i64) -> Self {
        Money::from_decimal(Decimal::from(amount))
    }

    /// create from cents
    pub fn from_minor(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_DP))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// take a ratio of this amount (e.g. 0.30 of income), quantized
    pub fn portion(&self, ratio: Decimal) -> Self {
        Money::from_decimal(self.0 * ratio)
    }

    /// amount after applying a flat rate once: self * (1 + rate)
    pub fn with_rate(&self, rate: Rate) -> Self {
        Money::from_decimal(self.0 * (Decimal::ONE + rate.as_decimal()))
    }

    /// split evenly over `parts`, quantized
    pub fn split(&self, parts: u32) -> Self {
        Money::from_decimal(self.0 / Decimal::from(parts.max(1)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::from_decimal(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money::from_decimal(self.0 - other.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, other: u32) -> Money {
        Money::from_decimal(self.0 * Decimal::from(other))
    }
}

/// rate type for monthly interest rates and ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    /// create from decimal (e.g., 0.08 for 8%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 8 for 8%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_half_up() {
        assert_eq!(Money::from_decimal(dec!(0.005)).as_decimal(), dec!(0.01));
        assert_eq!(Money::from_decimal(dec!(0.015)).as_decimal(), dec!(0.02));
        assert_eq!(Money::from_decimal(dec!(0.025)).as_decimal(), dec!(0.03));
        assert_eq!(Money::from_decimal(dec!(2.344)).as_decimal(), dec!(2.34));
    }

    #[test]
    fn test_money_always_two_places() {
        assert_eq!(Money::from_major(1800).to_string(), "1800.00");
        assert_eq!(Money::from_str_exact("7.1").unwrap().to_string(), "7.10");
        assert_eq!(Money::from_minor(1), Money::CENT);
    }

    #[test]
    fn test_parse_amount_strips_thousands_separators() {
        assert_eq!(Money::parse_amount(" 18,500.50 ").unwrap(), dec!(18500.50));
        assert_eq!(Money::parse_amount("2000").unwrap(), dec!(2000));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for input in ["", "   ", "abc", "12.3.4", "NaN", "inf"] {
            match Money::parse_amount(input) {
                Err(LendingError::InvalidAmount { input: echoed }) => assert_eq!(echoed, input),
                other => panic!("expected InvalidAmount for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_portion_and_split() {
        let income = Money::from_str_exact("1800.05").unwrap();
        // 540.015 rounds up
        assert_eq!(income.portion(dec!(0.30)).as_decimal(), dec!(540.02));
        assert_eq!(Money::from_major(100).split(3).as_decimal(), dec!(33.33));
        assert_eq!(Money::from_major(200).split(3).as_decimal(), dec!(66.67));
    }

    #[test]
    fn test_with_rate() {
        let principal = Money::from_major(180_000);
        let total = principal.with_rate(Rate::from_percentage(6));
        assert_eq!(total.as_decimal(), dec!(190800.00));
    }

    #[test]
    fn test_deserialized_money_is_quantized() {
        let money: Money = serde_json::from_str("\"1799.994\"").unwrap();
        assert_eq!(money.as_decimal(), dec!(1799.99));
        assert_eq!(money.to_string(), "1799.99");

        let money: Money = serde_json::from_str("\"7.5\"").unwrap();
        assert_eq!(money.to_string(), "7.50");
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percentage(8).to_string(), "8%");
        assert_eq!(Rate::from_decimal(dec!(0.10)).to_string(), "10%");
    }
}
