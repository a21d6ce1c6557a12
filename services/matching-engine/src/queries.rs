//! Read-only market data queries
//!
//! All of these read memory only. Book aggregation skips entries whose
//! validity deadline has passed; the expired orders themselves are purged
//! lazily by the matching and lookup paths.

use chrono::{DateTime, Utc};
use serde::Serialize;

use types::ids::{BrokerId, Symbol};
use types::money::{Price, Quantity};

use crate::engine::Engine;

pub const DEFAULT_BOOK_DEPTH: usize = 10;
pub const MAX_BOOK_DEPTH: usize = 50;
pub const DEFAULT_PRICE_WINDOW: usize = 50;
pub const MAX_PRICE_WINDOW: usize = 1000;

/// One aggregated price level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub order_count: usize,
}

/// Aggregated view of both sides of a symbol's book
///
/// Asks ascending, bids descending, at most `depth` levels each.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub depth: usize,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

/// Recent-trade price statistics for a symbol
#[derive(Debug, Clone, Serialize)]
pub struct PriceStats {
    pub symbol: Symbol,
    pub last_price: Price,
    /// Integer mean of the window, truncated toward zero
    pub average_price: Price,
    pub trades_in_average: usize,
}

/// A broker's current cash position
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub broker_id: BrokerId,
    pub broker_name: String,
    pub balance: i64,
}

impl Engine {
    /// Aggregate the book for `symbol`
    ///
    /// Returns `None` for a symbol that has never traded and never had a
    /// resting order.
    pub fn book_snapshot(
        &self,
        symbol: &Symbol,
        depth: usize,
        now: DateTime<Utc>,
    ) -> Option<BookSnapshot> {
        let known =
            self.books().contains_key(symbol) || self.trade_prices().contains_key(symbol);
        if !known {
            return None;
        }

        let (asks, bids) = match self.books().get(symbol) {
            Some(book) => (
                self.aggregate_side(book.side(types::order::Side::Ask), depth, now),
                self.aggregate_side(book.side(types::order::Side::Bid), depth, now),
            ),
            None => (Vec::new(), Vec::new()),
        };

        Some(BookSnapshot {
            symbol: symbol.clone(),
            depth,
            asks,
            bids,
        })
    }

    fn aggregate_side(
        &self,
        ladder: &crate::book::Ladder,
        depth: usize,
        now: DateTime<Utc>,
    ) -> Vec<BookLevel> {
        let mut levels = Vec::with_capacity(depth.min(8));
        for (price, queue) in ladder.levels_best_first() {
            let mut total_quantity = Quantity::zero();
            let mut order_count = 0;
            for order_id in queue.iter() {
                let Some(order) = self.orders_index().get(order_id) else {
                    continue;
                };
                // Stale entries awaiting lazy purge do not count
                if order.is_expired_at(now) {
                    continue;
                }
                total_quantity += order.remaining_quantity;
                order_count += 1;
            }
            if order_count == 0 {
                continue;
            }
            levels.push(BookLevel {
                price,
                total_quantity,
                order_count,
            });
            if levels.len() == depth {
                break;
            }
        }
        levels
    }

    /// Last and average price over the most recent `window` trades
    ///
    /// Returns `None` when the symbol has no recorded trades.
    pub fn price_stats(&self, symbol: &Symbol, window: usize) -> Option<PriceStats> {
        let ring = self.trade_prices().get(symbol)?;
        if ring.is_empty() {
            return None;
        }

        let take = window.min(ring.len());
        let sum: i64 = ring
            .iter()
            .rev()
            .take(take)
            .map(|price| price.cents())
            .sum();
        let last_price = *ring.back().expect("ring is non-empty");

        Some(PriceStats {
            symbol: symbol.clone(),
            last_price,
            average_price: Price::from_cents(sum / take as i64),
            trades_in_average: take,
        })
    }

    /// Current balance for a broker
    pub fn balance(&self, broker_id: BrokerId) -> Option<BalanceView> {
        self.brokers_map().get(&broker_id).map(|broker| BalanceView {
            broker_id,
            broker_name: broker.name.clone(),
            balance: broker.balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewOrder;
    use crate::events::event_channel;
    use chrono::Duration;
    use types::broker::Broker;
    use types::order::{OrderType, Side};

    fn harness() -> (Engine, BrokerId) {
        let (tx, _rx) = event_channel(1024);
        // Receiver is dropped; queries don't care about persistence
        let mut engine = Engine::new(tx);
        let broker = Broker::new("Query Broker", "e".repeat(64), None, Utc::now());
        let broker_id = broker.id;
        engine.register_broker(&broker);
        (engine, broker_id)
    }

    fn limit(
        broker_id: BrokerId,
        side: Side,
        price: i64,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> NewOrder {
        NewOrder {
            broker_id,
            document_number: "12345678901".to_string(),
            side,
            order_type: OrderType::Limit,
            symbol: Symbol::new("PETR4"),
            price: Some(Price::from_cents(price)),
            quantity: Quantity::new(quantity),
            valid_until: Some(now + Duration::hours(1)),
        }
    }

    #[test]
    fn test_unknown_symbol_has_no_book() {
        let (engine, _) = harness();
        assert!(engine
            .book_snapshot(&Symbol::new("XXXX"), DEFAULT_BOOK_DEPTH, Utc::now())
            .is_none());
    }

    #[test]
    fn test_resting_bid_appears_in_book() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        engine.submit(limit(broker_id, Side::Bid, 3400, 100, now), now);

        let snapshot = engine
            .book_snapshot(&Symbol::new("PETR4"), 5, now)
            .expect("symbol is known");
        assert!(snapshot.asks.is_empty());
        assert_eq!(
            snapshot.bids[0],
            BookLevel {
                price: Price::from_cents(3400),
                total_quantity: Quantity::new(100),
                order_count: 1,
            }
        );
    }

    #[test]
    fn test_book_levels_aggregate_and_sort() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        engine.submit(limit(broker_id, Side::Ask, 3520, 10, now), now);
        engine.submit(limit(broker_id, Side::Ask, 3500, 20, now), now);
        engine.submit(limit(broker_id, Side::Ask, 3500, 30, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3400, 40, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3450, 50, now), now);

        let snapshot = engine
            .book_snapshot(&Symbol::new("PETR4"), 10, now)
            .unwrap();
        let ask_prices: Vec<i64> = snapshot.asks.iter().map(|l| l.price.cents()).collect();
        let bid_prices: Vec<i64> = snapshot.bids.iter().map(|l| l.price.cents()).collect();
        assert_eq!(ask_prices, vec![3500, 3520]);
        assert_eq!(bid_prices, vec![3450, 3400]);
        assert_eq!(snapshot.asks[0].total_quantity, Quantity::new(50));
        assert_eq!(snapshot.asks[0].order_count, 2);
    }

    #[test]
    fn test_book_depth_truncates_levels() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        for offset in 0..5 {
            engine.submit(limit(broker_id, Side::Ask, 3500 + offset * 10, 10, now), now);
        }

        let snapshot = engine.book_snapshot(&Symbol::new("PETR4"), 3, now).unwrap();
        assert_eq!(snapshot.asks.len(), 3);
        assert_eq!(snapshot.asks[0].price, Price::from_cents(3500));
    }

    #[test]
    fn test_book_skips_expired_entries() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        let mut stale = limit(broker_id, Side::Ask, 3500, 10, now);
        stale.valid_until = Some(now + Duration::seconds(1));
        engine.submit(stale, now);
        engine.submit(limit(broker_id, Side::Ask, 3510, 20, now), now);

        let later = now + Duration::seconds(2);
        let snapshot = engine.book_snapshot(&Symbol::new("PETR4"), 5, later).unwrap();
        let ask_prices: Vec<i64> = snapshot.asks.iter().map(|l| l.price.cents()).collect();
        // The stale 3500 level is skipped entirely
        assert_eq!(ask_prices, vec![3510]);
    }

    #[test]
    fn test_price_stats_empty_ring() {
        let (engine, _) = harness();
        assert!(engine
            .price_stats(&Symbol::new("PETR4"), DEFAULT_PRICE_WINDOW)
            .is_none());
    }

    #[test]
    fn test_price_stats_last_and_average() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        engine.submit(limit(broker_id, Side::Ask, 3500, 10, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3500, 10, now), now);
        engine.submit(limit(broker_id, Side::Ask, 3510, 10, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3510, 10, now), now);

        let stats = engine
            .price_stats(&Symbol::new("PETR4"), DEFAULT_PRICE_WINDOW)
            .unwrap();
        assert_eq!(stats.last_price, Price::from_cents(3510));
        assert_eq!(stats.average_price, Price::from_cents(3505));
        assert_eq!(stats.trades_in_average, 2);
    }

    #[test]
    fn test_price_stats_window_truncation() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        for price in [3500, 3510, 3520] {
            engine.submit(limit(broker_id, Side::Ask, price, 10, now), now);
            engine.submit(limit(broker_id, Side::Bid, price, 10, now), now);
        }

        let stats = engine.price_stats(&Symbol::new("PETR4"), 2).unwrap();
        // Only the two most recent trades enter the average
        assert_eq!(stats.average_price, Price::from_cents(3515));
        assert_eq!(stats.trades_in_average, 2);
        assert_eq!(stats.last_price, Price::from_cents(3520));
    }

    #[test]
    fn test_integer_mean_truncates_toward_zero() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        for price in [3500, 3501] {
            engine.submit(limit(broker_id, Side::Ask, price, 10, now), now);
            engine.submit(limit(broker_id, Side::Bid, price, 10, now), now);
        }

        let stats = engine.price_stats(&Symbol::new("PETR4"), 50).unwrap();
        // (3500 + 3501) / 2 = 3500 in integer arithmetic
        assert_eq!(stats.average_price, Price::from_cents(3500));
    }

    #[test]
    fn test_symbol_known_after_trades_even_with_empty_book() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        engine.submit(limit(broker_id, Side::Ask, 3500, 10, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3500, 10, now), now);

        let snapshot = engine.book_snapshot(&Symbol::new("PETR4"), 5, now).unwrap();
        assert!(snapshot.asks.is_empty());
        assert!(snapshot.bids.is_empty());
    }

    #[test]
    fn test_balance_view() {
        let (mut engine, broker_id) = harness();
        let now = Utc::now();
        engine.submit(limit(broker_id, Side::Ask, 3500, 10, now), now);
        engine.submit(limit(broker_id, Side::Bid, 3500, 10, now), now);

        let view = engine.balance(broker_id).unwrap();
        assert_eq!(view.broker_name, "Query Broker");
        // Self-match nets to zero
        assert_eq!(view.balance, 0);
        assert!(engine.balance(BrokerId::new()).is_none());
    }

    #[test]
    fn test_recent_trade_ring_capacity() {
        let (mut engine, _) = harness();
        let prices: Vec<Price> = (0..1500).map(Price::from_cents).collect();
        engine.restore_trade_prices(Symbol::new("PETR4"), prices);

        let stats = engine
            .price_stats(&Symbol::new("PETR4"), MAX_PRICE_WINDOW)
            .unwrap();
        // Ring keeps only the newest 1000
        assert_eq!(stats.trades_in_average, 1000);
        assert_eq!(stats.last_price, Price::from_cents(1499));
    }
}
