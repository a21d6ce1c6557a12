//! Persistence event snapshots and the in-process event queue
//!
//! Every mutation the engine makes is mirrored as an immutable value
//! snapshot on this queue: the durable history must record orders as
//! submitted and trades as executed, even though the in-memory records keep
//! mutating through later cascades.
//!
//! The queue is an unbounded mpsc channel with a depth counter. The sender
//! notifies the flusher when the backlog reaches its batch threshold, so
//! the flusher wakes on its interval or on the threshold, whichever comes
//! first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Notify;

use types::ids::{BrokerId, OrderId};
use types::money::Quantity;
use types::order::{Order, OrderStatus};
use types::trade::Trade;

/// A trade plus the broker context needed to persist balances and dispatch
/// webhooks without consulting the registry at flush time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSnapshot {
    pub trade: Trade,
    pub buyer_broker_id: BrokerId,
    pub seller_broker_id: BrokerId,
    pub buyer_webhook_url: Option<String>,
    pub seller_webhook_url: Option<String>,
    /// Buy order's remaining quantity immediately after this execution
    pub buyer_remaining_quantity: Quantity,
    /// Sell order's remaining quantity immediately after this execution
    pub seller_remaining_quantity: Quantity,
}

/// Status / remaining-quantity change for one order
///
/// Within a flush batch only the last update per order id is persisted;
/// transitions are monotonic toward a terminal status, so the latest is
/// authoritative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub remaining_quantity: Quantity,
}

impl OrderUpdate {
    pub fn of(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            remaining_quantity: order.remaining_quantity,
        }
    }
}

/// Everything the flusher can drain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Full order state captured before its match cascade began
    NewOrder(Order),
    Trade(TradeSnapshot),
    OrderUpdate(OrderUpdate),
}

/// Producer half of the event queue, held by the engine
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
    depth: Arc<AtomicUsize>,
    threshold: usize,
    notify: Arc<Notify>,
}

impl EventSender {
    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            // Receiver gone: only happens during shutdown
            tracing::warn!("event queue receiver dropped; event discarded");
            return;
        }
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        if depth >= self.threshold {
            self.notify.notify_one();
        }
    }
}

/// Consumer half of the event queue, held by the flusher
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    depth: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

/// Result of one drain pass
#[derive(Debug)]
pub struct Drained {
    pub events: Vec<EngineEvent>,
    /// All senders dropped and the queue is exhausted
    pub disconnected: bool,
}

impl EventReceiver {
    /// Take up to `max` queued events without waiting
    pub fn drain(&mut self, max: usize) -> Drained {
        let mut events = Vec::new();
        let mut disconnected = false;
        while events.len() < max {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        self.depth.fetch_sub(events.len(), Ordering::Relaxed);
        Drained {
            events,
            disconnected,
        }
    }

    /// Wait until the sender reports the backlog crossed the threshold
    pub async fn threshold_reached(&self) {
        self.notify.notified().await;
    }

    /// Current backlog depth
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Create the event queue; `threshold` is the backlog depth that wakes the
/// flusher early
pub fn event_channel(threshold: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    let notify = Arc::new(Notify::new());
    (
        EventSender {
            tx,
            depth: Arc::clone(&depth),
            threshold,
            notify: Arc::clone(&notify),
        },
        EventReceiver { rx, depth, notify },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::Symbol;
    use types::money::Price;

    fn sample_update() -> EngineEvent {
        EngineEvent::OrderUpdate(OrderUpdate {
            order_id: OrderId::new(),
            status: OrderStatus::Filled,
            remaining_quantity: Quantity::zero(),
        })
    }

    #[test]
    fn test_drain_preserves_fifo() {
        let (tx, mut rx) = event_channel(64);
        let first = OrderId::new();
        let second = OrderId::new();
        for order_id in [first, second] {
            tx.send(EngineEvent::OrderUpdate(OrderUpdate {
                order_id,
                status: OrderStatus::Cancelled,
                remaining_quantity: Quantity::new(5),
            }));
        }

        let drained = rx.drain(16);
        assert_eq!(drained.events.len(), 2);
        assert!(!drained.disconnected);
        match (&drained.events[0], &drained.events[1]) {
            (EngineEvent::OrderUpdate(a), EngineEvent::OrderUpdate(b)) => {
                assert_eq!(a.order_id, first);
                assert_eq!(b.order_id, second);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_drain_respects_max() {
        let (tx, mut rx) = event_channel(64);
        for _ in 0..10 {
            tx.send(sample_update());
        }
        let drained = rx.drain(4);
        assert_eq!(drained.events.len(), 4);
        assert_eq!(rx.depth(), 6);
    }

    #[test]
    fn test_drain_reports_disconnect() {
        let (tx, mut rx) = event_channel(64);
        tx.send(sample_update());
        drop(tx);

        let drained = rx.drain(16);
        assert_eq!(drained.events.len(), 1);
        assert!(drained.disconnected);
    }

    #[tokio::test]
    async fn test_threshold_notifies() {
        let (tx, rx) = event_channel(3);
        for _ in 0..3 {
            tx.send(sample_update());
        }
        // Must complete immediately; the third send crossed the threshold
        tokio::time::timeout(std::time::Duration::from_millis(50), rx.threshold_reached())
            .await
            .expect("threshold notification");
    }

    #[test]
    fn test_trade_snapshot_is_value_copy() {
        let trade = Trade::new(
            Symbol::new("PETR4"),
            OrderId::new(),
            OrderId::new(),
            Price::from_cents(3500),
            Quantity::new(10),
            chrono::Utc::now(),
        );
        let snapshot = TradeSnapshot {
            trade: trade.clone(),
            buyer_broker_id: BrokerId::new(),
            seller_broker_id: BrokerId::new(),
            buyer_webhook_url: None,
            seller_webhook_url: Some("https://example.com/hook".to_string()),
            buyer_remaining_quantity: Quantity::new(90),
            seller_remaining_quantity: Quantity::zero(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: TradeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trade, trade);
    }
}
