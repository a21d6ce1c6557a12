//! Startup recovery
//!
//! Rebuilds the in-memory engine from the durable store before any request
//! is admitted, in a fixed order: brokers, then open orders (admission
//! order, which restores FIFO positions), then the trades those orders
//! participated in, then each symbol's recent trade prices. The flusher is
//! started only after recovery completes.
//!
//! Orders that were in memory but not yet flushed at crash time do not
//! come back; that bounded loss is part of the acknowledgment contract.

use chrono::{DateTime, Utc};

use matching_engine::engine::{Engine, RECENT_TRADE_CAPACITY};
use matching_engine::events::EventSender;
use types::ids::OrderId;

use crate::store::{Store, StoreError};

/// What recovery loaded, for the startup log
#[derive(Debug, Clone, Copy)]
pub struct RecoveryReport {
    pub brokers: usize,
    pub open_orders: usize,
    pub trades: usize,
    pub symbols_with_prices: usize,
}

/// Rehydrate a fresh engine from the store
pub async fn recover(
    store: &Store,
    events: EventSender,
    now: DateTime<Utc>,
) -> Result<(Engine, RecoveryReport), StoreError> {
    let mut engine = Engine::new(events);

    let brokers = store.load_brokers().await?;
    for broker in &brokers {
        engine.register_broker(broker);
    }
    tracing::info!(count = brokers.len(), "loaded brokers into memory");

    let open_orders = store.load_open_orders(now).await?;
    let order_ids: Vec<OrderId> = open_orders.iter().map(|order| order.id).collect();
    for order in open_orders {
        engine.restore_open_order(order);
    }
    tracing::info!(count = order_ids.len(), "loaded open orders into memory");

    let mut trade_count = 0;
    if !order_ids.is_empty() {
        for trade in store.load_trades_for_orders(&order_ids).await? {
            engine.restore_trade(trade);
            trade_count += 1;
        }
    }
    tracing::info!(count = trade_count, "loaded trades for open orders");

    let recent_prices = store.load_recent_prices(RECENT_TRADE_CAPACITY).await?;
    let symbols_with_prices = recent_prices.len();
    for (symbol, prices) in recent_prices {
        engine.restore_trade_prices(symbol, prices);
    }
    tracing::info!(
        count = symbols_with_prices,
        "loaded recent trade prices into memory"
    );

    Ok((
        engine,
        RecoveryReport {
            brokers: brokers.len(),
            open_orders: order_ids.len(),
            trades: trade_count,
            symbols_with_prices,
        },
    ))
}
