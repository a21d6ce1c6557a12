//! Order lifecycle types

use crate::ids::{BrokerId, OrderId, Symbol};
use crate::money::{Price, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl FromStr for Side {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bid" => Ok(Side::Bid),
            "ask" => Ok(Side::Ask),
            other => Err(ParseEnumError::new("side", other)),
        }
    }
}

/// Order pricing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Executes at the stated price or better; rests if unfilled
    Limit,
    /// Executes against the book immediately; unfilled remainder is dropped
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

impl FromStr for OrderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limit" => Ok(OrderType::Limit),
            "market" => Ok(OrderType::Market),
            other => Err(ParseEnumError::new("order type", other)),
        }
    }
}

/// Order status
///
/// `Open` is the only non-terminal state. A terminal order is never present
/// in any price ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Resting or still matching
    Open,
    /// Completely executed (terminal)
    Filled,
    /// Cancelled by the broker, or an unfilled market remainder (terminal)
    Cancelled,
    /// Validity deadline passed (terminal)
    Expired,
}

impl OrderStatus {
    /// Check if the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(OrderStatus::Open),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "expired" => Ok(OrderStatus::Expired),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

/// Error for unknown enum wire values
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A broker's buy or sell order
///
/// `price` and `valid_until` are present exactly when `order_type` is
/// `Limit`; market orders carry neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub broker_id: BrokerId,
    pub document_number: String,
    pub side: Side,
    pub order_type: OrderType,
    pub symbol: Symbol,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Check whether the order's validity deadline has passed
    ///
    /// Market orders never expire; they live only for one match cascade.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.valid_until {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    /// Decrement the remaining quantity by one fill, updating status
    pub fn apply_fill(&mut self, fill: Quantity) {
        debug_assert!(
            fill <= self.remaining_quantity,
            "fill exceeds remaining quantity"
        );
        self.remaining_quantity -= fill;
        if self.remaining_quantity.is_zero() {
            self.status = OrderStatus::Filled;
        }
    }

    /// Quantity executed so far
    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.remaining_quantity
    }

    /// Quantity invariant: remaining is zero exactly for filled orders
    pub fn check_invariant(&self) -> bool {
        self.remaining_quantity.is_zero() == (self.status == OrderStatus::Filled)
            && self.remaining_quantity <= self.quantity
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} x{}",
            self.id,
            self.side.as_str(),
            self.order_type.as_str(),
            self.symbol,
            self.remaining_quantity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_order(order_type: OrderType) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            broker_id: BrokerId::new(),
            document_number: "12345678901".to_string(),
            side: Side::Bid,
            order_type,
            symbol: Symbol::new("PETR4"),
            price: match order_type {
                OrderType::Limit => Some(Price::from_cents(3500)),
                OrderType::Market => None,
            },
            quantity: Quantity::new(100),
            remaining_quantity: Quantity::new(100),
            valid_until: match order_type {
                OrderType::Limit => Some(now + Duration::hours(1)),
                OrderType::Market => None,
            },
            status: OrderStatus::Open,
            created_at: now,
        }
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!OrderStatus::Open.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_status_roundtrip_str() {
        for status in [
            OrderStatus::Open,
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("closed".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_partial_fill_keeps_open() {
        let mut order = sample_order(OrderType::Limit);
        order.apply_fill(Quantity::new(40));
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.remaining_quantity, Quantity::new(60));
        assert_eq!(order.filled_quantity(), Quantity::new(40));
        assert!(order.check_invariant());
    }

    #[test]
    fn test_full_fill_transitions_to_filled() {
        let mut order = sample_order(OrderType::Limit);
        order.apply_fill(Quantity::new(100));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.remaining_quantity.is_zero());
        assert!(order.check_invariant());
    }

    #[test]
    fn test_market_order_never_expires() {
        let order = sample_order(OrderType::Market);
        assert!(!order.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_limit_order_expiry_at_deadline() {
        let mut order = sample_order(OrderType::Limit);
        let deadline = Utc::now();
        order.valid_until = Some(deadline);
        // The deadline itself counts as expired
        assert!(order.is_expired_at(deadline));
        assert!(!order.is_expired_at(deadline - Duration::seconds(1)));
    }

    #[test]
    fn test_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Bid).unwrap(), "\"bid\"");
        assert_eq!(serde_json::to_string(&Side::Ask).unwrap(), "\"ask\"");
    }
}
