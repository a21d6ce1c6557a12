//! Batch planning
//!
//! Groups a drained slice of engine events by kind, deduplicates order
//! updates, and pre-computes the balance deltas the batch implies. The
//! planner is pure; the store applies the plan in one transaction.

use std::collections::HashMap;

use matching_engine::events::{EngineEvent, OrderUpdate, TradeSnapshot};
use types::ids::{BrokerId, OrderId};
use types::order::Order;

/// One flush-ready batch
#[derive(Debug, Default)]
pub struct BatchPlan {
    /// Pristine order snapshots, queue order preserved
    pub new_orders: Vec<Order>,
    /// Trades, queue order preserved
    pub trades: Vec<TradeSnapshot>,
    /// Order updates deduplicated per order id, last update winning
    pub order_updates: Vec<OrderUpdate>,
    /// Net balance movement per broker implied by this batch's trades
    pub balance_deltas: Vec<(BrokerId, i64)>,
}

impl BatchPlan {
    /// Plan a batch from drained events
    ///
    /// Status transitions are monotonic toward a terminal state, so when an
    /// order appears in several updates only the last one is authoritative.
    pub fn build(events: Vec<EngineEvent>) -> Self {
        let mut new_orders = Vec::new();
        let mut trades: Vec<TradeSnapshot> = Vec::new();
        let mut updates: HashMap<OrderId, (usize, OrderUpdate)> = HashMap::new();

        for (position, event) in events.into_iter().enumerate() {
            match event {
                EngineEvent::NewOrder(order) => new_orders.push(order),
                EngineEvent::Trade(snapshot) => trades.push(snapshot),
                EngineEvent::OrderUpdate(update) => {
                    updates.insert(update.order_id, (position, update));
                }
            }
        }

        // Keep queue order among the surviving updates
        let mut order_updates: Vec<(usize, OrderUpdate)> = updates.into_values().collect();
        order_updates.sort_by_key(|(position, _)| *position);
        let order_updates = order_updates
            .into_iter()
            .map(|(_, update)| update)
            .collect();

        let mut deltas: HashMap<BrokerId, i64> = HashMap::new();
        for snapshot in &trades {
            let notional = snapshot.trade.notional();
            *deltas.entry(snapshot.buyer_broker_id).or_insert(0) -= notional;
            *deltas.entry(snapshot.seller_broker_id).or_insert(0) += notional;
        }
        let balance_deltas = deltas
            .into_iter()
            .filter(|(_, delta)| *delta != 0)
            .collect();

        Self {
            new_orders,
            trades,
            order_updates,
            balance_deltas,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_orders.is_empty() && self.trades.is_empty() && self.order_updates.is_empty()
    }

    /// Number of rows this plan will touch, for logging
    pub fn row_count(&self) -> usize {
        self.new_orders.len()
            + self.trades.len()
            + self.order_updates.len()
            + self.balance_deltas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::ids::Symbol;
    use types::money::{Price, Quantity};
    use types::order::{OrderStatus, OrderType, Side};
    use types::trade::Trade;

    fn order(order_id: OrderId) -> Order {
        let now = Utc::now();
        Order {
            id: order_id,
            broker_id: BrokerId::new(),
            document_number: "12345678901".to_string(),
            side: Side::Bid,
            order_type: OrderType::Limit,
            symbol: Symbol::new("PETR4"),
            price: Some(Price::from_cents(3500)),
            quantity: Quantity::new(100),
            remaining_quantity: Quantity::new(100),
            valid_until: Some(now),
            status: OrderStatus::Open,
            created_at: now,
        }
    }

    fn trade_snapshot(buyer: BrokerId, seller: BrokerId, price: i64, quantity: i64) -> TradeSnapshot {
        TradeSnapshot {
            trade: Trade::new(
                Symbol::new("PETR4"),
                OrderId::new(),
                OrderId::new(),
                Price::from_cents(price),
                Quantity::new(quantity),
                Utc::now(),
            ),
            buyer_broker_id: buyer,
            seller_broker_id: seller,
            buyer_webhook_url: None,
            seller_webhook_url: None,
            buyer_remaining_quantity: Quantity::zero(),
            seller_remaining_quantity: Quantity::zero(),
        }
    }

    #[test]
    fn test_groups_by_kind() {
        let order_id = OrderId::new();
        let events = vec![
            EngineEvent::NewOrder(order(order_id)),
            EngineEvent::Trade(trade_snapshot(BrokerId::new(), BrokerId::new(), 3500, 10)),
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id,
                status: OrderStatus::Filled,
                remaining_quantity: Quantity::zero(),
            }),
        ];

        let plan = BatchPlan::build(events);
        assert_eq!(plan.new_orders.len(), 1);
        assert_eq!(plan.trades.len(), 1);
        assert_eq!(plan.order_updates.len(), 1);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_update_dedup_keeps_last() {
        let order_id = OrderId::new();
        let events = vec![
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id,
                status: OrderStatus::Open,
                remaining_quantity: Quantity::new(40),
            }),
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id,
                status: OrderStatus::Filled,
                remaining_quantity: Quantity::zero(),
            }),
        ];

        let plan = BatchPlan::build(events);
        assert_eq!(plan.order_updates.len(), 1);
        assert_eq!(plan.order_updates[0].status, OrderStatus::Filled);
        assert!(plan.order_updates[0].remaining_quantity.is_zero());
    }

    #[test]
    fn test_dedup_preserves_queue_order_across_orders() {
        let first = OrderId::new();
        let second = OrderId::new();
        let events = vec![
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id: first,
                status: OrderStatus::Open,
                remaining_quantity: Quantity::new(10),
            }),
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id: second,
                status: OrderStatus::Cancelled,
                remaining_quantity: Quantity::new(5),
            }),
            EngineEvent::OrderUpdate(OrderUpdate {
                order_id: first,
                status: OrderStatus::Filled,
                remaining_quantity: Quantity::zero(),
            }),
        ];

        let plan = BatchPlan::build(events);
        assert_eq!(plan.order_updates.len(), 2);
        // First order's surviving update sits where its last event was
        assert_eq!(plan.order_updates[0].order_id, second);
        assert_eq!(plan.order_updates[1].order_id, first);
    }

    #[test]
    fn test_balance_deltas_sum_to_zero() {
        let buyer = BrokerId::new();
        let seller = BrokerId::new();
        let events = vec![
            EngineEvent::Trade(trade_snapshot(buyer, seller, 3500, 100)),
            EngineEvent::Trade(trade_snapshot(buyer, seller, 3510, 50)),
        ];

        let plan = BatchPlan::build(events);
        let total: i64 = plan.balance_deltas.iter().map(|(_, delta)| delta).sum();
        assert_eq!(total, 0);

        let buyer_delta = plan
            .balance_deltas
            .iter()
            .find(|(id, _)| *id == buyer)
            .map(|(_, delta)| *delta)
            .unwrap();
        assert_eq!(buyer_delta, -(3500 * 100 + 3510 * 50));
    }

    #[test]
    fn test_self_trade_delta_drops_out() {
        let broker = BrokerId::new();
        let events = vec![EngineEvent::Trade(trade_snapshot(broker, broker, 3500, 100))];

        let plan = BatchPlan::build(events);
        // Credit and debit cancel; no row to write
        assert!(plan.balance_deltas.is_empty());
    }

    #[test]
    fn test_empty_events_empty_plan() {
        let plan = BatchPlan::build(Vec::new());
        assert!(plan.is_empty());
        assert_eq!(plan.row_count(), 0);
    }
}
