//! Durable store access
//!
//! All SQL lives here. The store is never on the matching hot path: the
//! flusher writes batches, recovery reads at boot, and the one read-path
//! exception is the order-lookup fallback for pre-restart history.
//!
//! The pool is intentionally small. The flusher is a single task and the
//! fallback path is read-only, so four connections cover both consumers
//! without contention.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use matching_engine::engine::TradeDetail;
use types::broker::Broker;
use types::ids::{BrokerId, OrderId, Symbol, TradeId};
use types::money::{Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, ParseEnumError, Side};
use types::trade::Trade;

use crate::batch::BatchPlan;

const POOL_SIZE: u32 = 4;

/// Logical schema: brokers, orders, trades
///
/// Kept as plain DDL so a fresh database can be bootstrapped without a
/// migration tool. The partial index on open orders accelerates recovery;
/// steady state never touches the store for matching.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS brokers (
        id UUID PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        api_key_hash VARCHAR(255) NOT NULL UNIQUE,
        webhook_url VARCHAR(2048),
        balance BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        broker_id UUID NOT NULL REFERENCES brokers(id),
        document_number VARCHAR(20) NOT NULL,
        side TEXT NOT NULL,
        order_type TEXT NOT NULL,
        symbol VARCHAR(10) NOT NULL,
        price BIGINT,
        quantity BIGINT NOT NULL,
        remaining_quantity BIGINT NOT NULL,
        valid_until TIMESTAMPTZ,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS ix_orders_matching
        ON orders (symbol, side, price, created_at) WHERE status = 'open'",
    "CREATE INDEX IF NOT EXISTS ix_orders_broker ON orders (broker_id, created_at)",
    "CREATE TABLE IF NOT EXISTS trades (
        id UUID PRIMARY KEY,
        buy_order_id UUID NOT NULL REFERENCES orders(id),
        sell_order_id UUID NOT NULL REFERENCES orders(id),
        symbol VARCHAR(10) NOT NULL,
        price BIGINT NOT NULL,
        quantity BIGINT NOT NULL,
        executed_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS ix_trades_symbol ON trades (symbol, executed_at)",
    "CREATE INDEX IF NOT EXISTS ix_trades_buy_order ON trades (buy_order_id)",
    "CREATE INDEX IF NOT EXISTS ix_trades_sell_order ON trades (sell_order_id)",
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
}

/// Handle to the Postgres store
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect with the fixed-size pool
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ── Flush path ──────────────────────────────────────────────────

    /// Apply one batch in a single transaction
    ///
    /// Fixed statement order: new orders, trades, order updates, balance
    /// deltas. New-order events precede updates for the same id in the
    /// queue, so inserts always land before their updates.
    pub async fn apply_batch(&self, plan: &BatchPlan) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for order in &plan.new_orders {
            sqlx::query(
                "INSERT INTO orders (id, broker_id, document_number, side, order_type, \
                 symbol, price, quantity, remaining_quantity, valid_until, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(order.id.as_uuid())
            .bind(order.broker_id.as_uuid())
            .bind(&order.document_number)
            .bind(order.side.as_str())
            .bind(order.order_type.as_str())
            .bind(order.symbol.as_str())
            .bind(order.price.map(|price| price.cents()))
            .bind(order.quantity.units())
            .bind(order.remaining_quantity.units())
            .bind(order.valid_until)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for snapshot in &plan.trades {
            let trade = &snapshot.trade;
            sqlx::query(
                "INSERT INTO trades (id, buy_order_id, sell_order_id, symbol, price, \
                 quantity, executed_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(trade.id.as_uuid())
            .bind(trade.buy_order_id.as_uuid())
            .bind(trade.sell_order_id.as_uuid())
            .bind(trade.symbol.as_str())
            .bind(trade.price.cents())
            .bind(trade.quantity.units())
            .bind(trade.executed_at)
            .execute(&mut *tx)
            .await?;
        }

        for update in &plan.order_updates {
            sqlx::query(
                "UPDATE orders SET status = $1, remaining_quantity = $2 WHERE id = $3",
            )
            .bind(update.status.as_str())
            .bind(update.remaining_quantity.units())
            .bind(update.order_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        for (broker_id, delta) in &plan.balance_deltas {
            sqlx::query("UPDATE brokers SET balance = balance + $1 WHERE id = $2")
                .bind(delta)
                .bind(broker_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ── Broker registration ─────────────────────────────────────────

    /// Insert a broker synchronously (registration is not queued)
    pub async fn insert_broker(&self, broker: &Broker) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO brokers (id, name, api_key_hash, webhook_url, balance, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(broker.id.as_uuid())
        .bind(&broker.name)
        .bind(&broker.api_key_hash)
        .bind(&broker.webhook_url)
        .bind(broker.balance)
        .bind(broker.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Lookup fallback ─────────────────────────────────────────────

    /// Fetch one order for the pre-restart lookup path
    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, broker_id, document_number, side, order_type, symbol, price, \
             quantity, remaining_quantity, valid_until, status, created_at \
             FROM orders WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| order_from_row(&row)).transpose()
    }

    /// Trades an order participated in, with counterparty broker names
    pub async fn fetch_trade_details(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<TradeDetail>, StoreError> {
        let rows = sqlx::query(
            "SELECT t.id, t.price, t.quantity, t.executed_at, b.name AS counterparty \
             FROM trades t \
             JOIN orders o ON o.id = CASE WHEN t.buy_order_id = $1 \
                 THEN t.sell_order_id ELSE t.buy_order_id END \
             JOIN brokers b ON b.id = o.broker_id \
             WHERE t.buy_order_id = $1 OR t.sell_order_id = $1 \
             ORDER BY t.executed_at",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TradeDetail {
                trade_id: TradeId::from_uuid(row.get::<Uuid, _>("id")),
                price: Price::from_cents(row.get("price")),
                quantity: Quantity::new(row.get("quantity")),
                counterparty_broker: row.get("counterparty"),
                executed_at: row.get("executed_at"),
            })
            .collect())
    }

    // ── Recovery queries ────────────────────────────────────────────

    pub async fn load_brokers(&self) -> Result<Vec<Broker>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, api_key_hash, webhook_url, balance, created_at FROM brokers",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Broker {
                id: BrokerId::from_uuid(row.get::<Uuid, _>("id")),
                name: row.get("name"),
                api_key_hash: row.get("api_key_hash"),
                webhook_url: row.get("webhook_url"),
                balance: row.get("balance"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Open, unexpired orders in admission order
    ///
    /// The ascending sort rebuilds FIFO positions within each price level.
    pub async fn load_open_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, broker_id, document_number, side, order_type, symbol, price, \
             quantity, remaining_quantity, valid_until, status, created_at \
             FROM orders WHERE status = 'open' AND valid_until > $1 \
             ORDER BY created_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    /// All trades referencing any of the given orders
    pub async fn load_trades_for_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<Trade>, StoreError> {
        let ids: Vec<Uuid> = order_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, buy_order_id, sell_order_id, symbol, price, quantity, executed_at \
             FROM trades WHERE buy_order_id = ANY($1) OR sell_order_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Trade {
                id: TradeId::from_uuid(row.get::<Uuid, _>("id")),
                buy_order_id: OrderId::from_uuid(row.get::<Uuid, _>("buy_order_id")),
                sell_order_id: OrderId::from_uuid(row.get::<Uuid, _>("sell_order_id")),
                symbol: Symbol::new(row.get::<String, _>("symbol")),
                price: Price::from_cents(row.get("price")),
                quantity: Quantity::new(row.get("quantity")),
                executed_at: row.get("executed_at"),
            })
            .collect())
    }

    /// Up to `per_symbol` most recent trade prices for every symbol,
    /// returned oldest-first per symbol
    pub async fn load_recent_prices(
        &self,
        per_symbol: usize,
    ) -> Result<HashMap<Symbol, Vec<Price>>, StoreError> {
        let rows = sqlx::query("SELECT symbol, price FROM trades ORDER BY executed_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut recent: HashMap<Symbol, Vec<Price>> = HashMap::new();
        for row in &rows {
            let symbol = Symbol::new(row.get::<String, _>("symbol"));
            let prices = recent.entry(symbol).or_default();
            if prices.len() < per_symbol {
                prices.push(Price::from_cents(row.get("price")));
            }
        }
        for prices in recent.values_mut() {
            prices.reverse();
        }
        Ok(recent)
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    Ok(Order {
        id: OrderId::from_uuid(row.get::<Uuid, _>("id")),
        broker_id: BrokerId::from_uuid(row.get::<Uuid, _>("broker_id")),
        document_number: row.get("document_number"),
        side: Side::from_str(row.get::<String, _>("side").as_str())?,
        order_type: OrderType::from_str(row.get::<String, _>("order_type").as_str())?,
        symbol: Symbol::new(row.get::<String, _>("symbol")),
        price: row.get::<Option<i64>, _>("price").map(Price::from_cents),
        quantity: Quantity::new(row.get("quantity")),
        remaining_quantity: Quantity::new(row.get("remaining_quantity")),
        valid_until: row.get("valid_until"),
        status: OrderStatus::from_str(row.get::<String, _>("status").as_str())?,
        created_at: row.get("created_at"),
    })
}
