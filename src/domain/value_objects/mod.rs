//! Value Objects for jewelry commerce

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Round a currency amount to 2 decimals, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Money value object. The currency is a fixed label, never converted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount: round_money(amount), currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Largest quantity a single cart line or a collapsed group may hold.
pub const MAX_QUANTITY: u32 = 100_000;

/// Line quantity, between 1 and [`MAX_QUANTITY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::BelowOne(value)); }
        match u32::try_from(value) {
            Ok(v) if v <= MAX_QUANTITY => Ok(Self(v)),
            _ => Err(QuantityError::TooLarge(value)),
        }
    }
    pub fn one() -> Self { Self(1) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn checked_add(&self, other: Quantity) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { BelowOne(i64), TooLarge(i64) }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowOne(v) => write!(f, "quantity must be at least 1, got {}", v),
            Self::TooLarge(v) => write!(f, "quantity {} is too large, at most {} allowed", v, MAX_QUANTITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(12, 1)), Decimal::new(12, 1));
    }
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "INR");
        let b = Money::new(Decimal::new(5050, 2), "INR");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(15050, 2));
        assert_eq!(a.add(&Money::zero("USD")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_quantity_bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert_eq!(Quantity::new(4).unwrap().checked_add(Quantity::one()).unwrap().value(), 5);
        assert_eq!(Quantity::new(i64::from(MAX_QUANTITY)).unwrap().value(), MAX_QUANTITY);
        assert_eq!(Quantity::new(3_000_000_000), Err(QuantityError::TooLarge(3_000_000_000)));
        let max = Quantity::new(i64::from(MAX_QUANTITY)).unwrap();
        assert!(matches!(max.checked_add(Quantity::one()), Err(QuantityError::TooLarge(_))));
    }
}
