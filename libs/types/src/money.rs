//! Integer-cents money types
//!
//! Prices are quoted in the smallest monetary unit (cents) and stored as
//! signed 64-bit integers, so all arithmetic is exact. Two implicit decimal
//! places: a price of 3500 displays as "35.00".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A price in integer cents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Create a price from integer cents
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Get the raw cents value
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Total value of `quantity` units at this price, in cents
    pub fn notional(&self, quantity: Quantity) -> i64 {
        self.0 * quantity.units()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// An order or trade quantity in whole units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(units: i64) -> Self {
        Self(units)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The smaller of two quantities (fill size of a match)
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        debug_assert!(self.0 >= rhs.0, "quantity subtraction would go negative");
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Self) {
        debug_assert!(self.0 >= rhs.0, "quantity subtraction would go negative");
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display_two_decimals() {
        assert_eq!(Price::from_cents(3500).to_string(), "35.00");
        assert_eq!(Price::from_cents(3507).to_string(), "35.07");
        assert_eq!(Price::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_price_ordering() {
        assert!(Price::from_cents(3400) < Price::from_cents(3500));
    }

    #[test]
    fn test_notional() {
        let price = Price::from_cents(3500);
        assert_eq!(price.notional(Quantity::new(100)), 350_000);
    }

    #[test]
    fn test_quantity_min() {
        let a = Quantity::new(60);
        let b = Quantity::new(100);
        assert_eq!(a.min(b), Quantity::new(60));
        assert_eq!(b.min(a), Quantity::new(60));
    }

    #[test]
    fn test_quantity_sub_assign() {
        let mut q = Quantity::new(100);
        q -= Quantity::new(40);
        assert_eq!(q, Quantity::new(60));
        q -= Quantity::new(60);
        assert!(q.is_zero());
    }

    #[test]
    fn test_price_serializes_as_integer() {
        let json = serde_json::to_string(&Price::from_cents(3510)).unwrap();
        assert_eq!(json, "3510");
    }
}
