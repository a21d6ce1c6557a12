//! Trade records
//!
//! A trade is immutable once emitted by the matching core.

use crate::ids::{OrderId, Symbol, TradeId};
use crate::money::{Price, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution between a buy order and a sell order
///
/// `price` is always the resting (passive) participant's price, never the
/// aggressor's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: Symbol,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        symbol: Symbol,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        price: Price,
        quantity: Quantity,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TradeId::new(),
            symbol,
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            executed_at,
        }
    }

    /// Cash moved by this trade, in cents
    pub fn notional(&self) -> i64 {
        self.price.notional(self.quantity)
    }

    /// The other participant's order id, given one participant's
    pub fn counterparty_of(&self, order_id: OrderId) -> OrderId {
        if self.buy_order_id == order_id {
            self.sell_order_id
        } else {
            self.buy_order_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade::new(
            Symbol::new("PETR4"),
            OrderId::new(),
            OrderId::new(),
            Price::from_cents(3500),
            Quantity::new(100),
            Utc::now(),
        )
    }

    #[test]
    fn test_notional() {
        let trade = sample_trade();
        assert_eq!(trade.notional(), 350_000);
    }

    #[test]
    fn test_counterparty_of() {
        let trade = sample_trade();
        assert_eq!(trade.counterparty_of(trade.buy_order_id), trade.sell_order_id);
        assert_eq!(trade.counterparty_of(trade.sell_order_id), trade.buy_order_id);
    }

    #[test]
    fn test_trade_serialization() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deserialized: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deserialized);
    }
}
