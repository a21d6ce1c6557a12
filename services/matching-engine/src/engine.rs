//! Engine state and the match cascade
//!
//! One `Engine` owns every piece of in-memory state: the order index, the
//! trade index, per-symbol books, the broker registry, and the recent-trade
//! rings. All mutation goes through the single writer that owns this
//! struct; queries see a consistent snapshot between cascades.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use types::broker::Broker;
use types::ids::{BrokerId, OrderId, Symbol, TradeId};
use types::money::{Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side};
use types::trade::Trade;

use crate::book::SymbolBook;
use crate::events::{EngineEvent, EventSender, OrderUpdate, TradeSnapshot};

/// Capacity of each symbol's recent-trade ring
pub const RECENT_TRADE_CAPACITY: usize = 1000;

/// In-memory broker record
#[derive(Debug, Clone)]
pub struct BrokerState {
    pub name: String,
    pub webhook_url: Option<String>,
    /// Cumulative signed cents: sells credit, buys debit
    pub balance: i64,
}

/// An admission-validated order submission
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub broker_id: BrokerId,
    pub document_number: String,
    pub side: Side,
    pub order_type: OrderType,
    pub symbol: Symbol,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Outcome of a submission: the assigned id and the executions it caused
#[derive(Debug)]
pub struct Submission {
    pub order_id: OrderId,
    pub trades: Vec<Trade>,
}

/// Outcome of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was open and is now cancelled
    Cancelled,
    /// Missing, already closed, or a market order: nothing to do
    Noop,
    /// The order belongs to a different broker
    NotOwner,
}

/// Failed order lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    NotFound,
    Forbidden,
}

/// One execution as seen from a single participant's order
#[derive(Debug, Clone)]
pub struct TradeDetail {
    pub trade_id: TradeId,
    pub price: Price,
    pub quantity: Quantity,
    pub counterparty_broker: String,
    pub executed_at: DateTime<Utc>,
}

/// Order lookup result: the record plus its execution history
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub trades: Vec<TradeDetail>,
}

/// The single-writer matching engine
pub struct Engine {
    books: HashMap<Symbol, SymbolBook>,
    orders: HashMap<OrderId, Order>,
    trades_by_order: HashMap<OrderId, Vec<Trade>>,
    brokers: HashMap<BrokerId, BrokerState>,
    brokers_by_key_hash: HashMap<String, BrokerId>,
    trade_prices: HashMap<Symbol, VecDeque<Price>>,
    events: EventSender,
}

impl Engine {
    pub fn new(events: EventSender) -> Self {
        Self {
            books: HashMap::new(),
            orders: HashMap::new(),
            trades_by_order: HashMap::new(),
            brokers: HashMap::new(),
            brokers_by_key_hash: HashMap::new(),
            trade_prices: HashMap::new(),
            events,
        }
    }

    // ── Broker registry ─────────────────────────────────────────────

    /// Add a broker to both registry maps
    ///
    /// Used after a registration commits and during recovery.
    pub fn register_broker(&mut self, broker: &Broker) {
        self.brokers.insert(
            broker.id,
            BrokerState {
                name: broker.name.clone(),
                webhook_url: broker.webhook_url.clone(),
                balance: broker.balance,
            },
        );
        self.brokers_by_key_hash
            .insert(broker.api_key_hash.clone(), broker.id);
    }

    /// Resolve an API-key hash to a broker id
    pub fn authenticate(&self, key_hash: &str) -> Option<BrokerId> {
        self.brokers_by_key_hash.get(key_hash).copied()
    }

    pub fn broker(&self, broker_id: BrokerId) -> Option<&BrokerState> {
        self.brokers.get(&broker_id)
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Admit a new order: match it against the opposite ladder, then rest
    /// or discard the remainder
    pub fn submit(&mut self, request: NewOrder, now: DateTime<Utc>) -> Submission {
        let mut order = Order {
            id: OrderId::new(),
            broker_id: request.broker_id,
            document_number: request.document_number,
            side: request.side,
            order_type: request.order_type,
            symbol: request.symbol,
            price: request.price,
            quantity: request.quantity,
            remaining_quantity: request.quantity,
            valid_until: request.valid_until,
            status: OrderStatus::Open,
            created_at: now,
        };

        // Pristine snapshot first: durable history records the order as
        // submitted, not as left after trading
        self.events.send(EngineEvent::NewOrder(order.clone()));

        let trades = self.run_match(&mut order, now);

        if !order.remaining_quantity.is_zero() {
            match order.order_type {
                // Immediate-or-cancel: the unfilled remainder is never rested
                OrderType::Market => order.status = OrderStatus::Cancelled,
                OrderType::Limit => {
                    let price = order.price.expect("limit order carries a price");
                    self.books
                        .entry(order.symbol.clone())
                        .or_default()
                        .side_mut(order.side)
                        .insert(order.id, price);
                }
            }
        }

        if !trades.is_empty() || order.status.is_terminal() {
            self.events
                .send(EngineEvent::OrderUpdate(OrderUpdate::of(&order)));
        }

        let order_id = order.id;
        self.orders.insert(order_id, order);
        Submission { order_id, trades }
    }

    /// The match cascade. Runs to completion without suspension.
    fn run_match(&mut self, taker: &mut Order, now: DateTime<Utc>) -> Vec<Trade> {
        let mut trades = Vec::new();
        let symbol = taker.symbol.clone();
        let resting_side = taker.side.opposite();

        while !taker.remaining_quantity.is_zero() {
            let best = self
                .books
                .get(&symbol)
                .and_then(|book| book.side(resting_side).front_of_best());
            let Some((best_price, candidate_id)) = best else {
                break;
            };

            let candidate = self
                .orders
                .get(&candidate_id)
                .expect("resting order is indexed");

            // Purge lazily-expired candidates and keep drawing
            if candidate.is_expired_at(now) {
                self.expire_open_order(candidate_id);
                continue;
            }

            let crosses = match taker.order_type {
                OrderType::Market => true,
                OrderType::Limit => {
                    let limit = taker.price.expect("limit order carries a price");
                    match taker.side {
                        Side::Bid => limit >= best_price,
                        Side::Ask => limit <= best_price,
                    }
                }
            };
            if !crosses {
                break;
            }

            // Execute at the resting order's price, never the aggressor's
            let candidate = self
                .orders
                .get_mut(&candidate_id)
                .expect("resting order is indexed");
            let fill = taker.remaining_quantity.min(candidate.remaining_quantity);
            taker.apply_fill(fill);
            candidate.apply_fill(fill);

            let (buy_order_id, sell_order_id) = match taker.side {
                Side::Bid => (taker.id, candidate.id),
                Side::Ask => (candidate.id, taker.id),
            };
            let (buyer_broker_id, seller_broker_id) = match taker.side {
                Side::Bid => (taker.broker_id, candidate.broker_id),
                Side::Ask => (candidate.broker_id, taker.broker_id),
            };
            let (buyer_remaining, seller_remaining) = match taker.side {
                Side::Bid => (taker.remaining_quantity, candidate.remaining_quantity),
                Side::Ask => (candidate.remaining_quantity, taker.remaining_quantity),
            };

            let candidate_filled = candidate.remaining_quantity.is_zero();
            let candidate_update = OrderUpdate::of(candidate);

            let trade = Trade::new(
                symbol.clone(),
                buy_order_id,
                sell_order_id,
                best_price,
                fill,
                now,
            );

            if candidate_filled {
                self.books
                    .get_mut(&symbol)
                    .expect("candidate came from this book")
                    .side_mut(resting_side)
                    .remove(&candidate_id);
            }

            self.settle_balances(buyer_broker_id, seller_broker_id, trade.notional());
            self.push_trade_price(&symbol, trade.price);
            self.trades_by_order
                .entry(buy_order_id)
                .or_default()
                .push(trade.clone());
            self.trades_by_order
                .entry(sell_order_id)
                .or_default()
                .push(trade.clone());

            self.events.send(EngineEvent::Trade(TradeSnapshot {
                trade: trade.clone(),
                buyer_broker_id,
                seller_broker_id,
                buyer_webhook_url: self.webhook_url_of(buyer_broker_id),
                seller_webhook_url: self.webhook_url_of(seller_broker_id),
                buyer_remaining_quantity: buyer_remaining,
                seller_remaining_quantity: seller_remaining,
            }));
            self.events
                .send(EngineEvent::OrderUpdate(candidate_update));

            trades.push(trade);
        }

        trades
    }

    // ── Cancel ──────────────────────────────────────────────────────

    /// Cancel an open limit order. Idempotent: repeat calls and calls
    /// against missing/closed/market orders change nothing.
    pub fn cancel(&mut self, broker_id: BrokerId, order_id: OrderId) -> CancelOutcome {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return CancelOutcome::Noop;
        };
        if order.broker_id != broker_id {
            return CancelOutcome::NotOwner;
        }
        if order.status != OrderStatus::Open || order.order_type == OrderType::Market {
            return CancelOutcome::Noop;
        }

        order.status = OrderStatus::Cancelled;
        let update = OrderUpdate::of(order);
        let symbol = order.symbol.clone();
        let side = order.side;
        if let Some(book) = self.books.get_mut(&symbol) {
            book.side_mut(side).remove(&order_id);
        }
        self.events.send(EngineEvent::OrderUpdate(update));
        CancelOutcome::Cancelled
    }

    // ── Lookup ──────────────────────────────────────────────────────

    /// Fetch an order with its trades, applying lazy expiration
    pub fn order_detail(
        &mut self,
        broker_id: BrokerId,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<OrderDetail, LookupError> {
        let order = self.orders.get(&order_id).ok_or(LookupError::NotFound)?;
        if order.broker_id != broker_id {
            return Err(LookupError::Forbidden);
        }
        if order.status == OrderStatus::Open && order.is_expired_at(now) {
            self.expire_open_order(order_id);
        }

        let order = self
            .orders
            .get(&order_id)
            .expect("order still indexed")
            .clone();
        let trades = self.trade_details_for(order_id);
        Ok(OrderDetail { order, trades })
    }

    /// Trades an order participated in, with counterparty broker names
    pub fn trade_details_for(&self, order_id: OrderId) -> Vec<TradeDetail> {
        let Some(trades) = self.trades_by_order.get(&order_id) else {
            return Vec::new();
        };
        trades
            .iter()
            .map(|trade| {
                let counterparty_broker = self
                    .orders
                    .get(&trade.counterparty_of(order_id))
                    .and_then(|counter| self.brokers.get(&counter.broker_id))
                    .map(|broker| broker.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                TradeDetail {
                    trade_id: trade.id,
                    price: trade.price,
                    quantity: trade.quantity,
                    counterparty_broker,
                    executed_at: trade.executed_at,
                }
            })
            .collect()
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    // ── Recovery hooks ──────────────────────────────────────────────

    /// Re-index an order restored from the durable store
    ///
    /// Callers feed orders in `created_at` ascending order so FIFO
    /// positions are rebuilt faithfully. No events are emitted.
    pub fn restore_open_order(&mut self, order: Order) {
        debug_assert_eq!(order.status, OrderStatus::Open);
        if let (OrderType::Limit, Some(price)) = (order.order_type, order.price) {
            self.books
                .entry(order.symbol.clone())
                .or_default()
                .side_mut(order.side)
                .insert(order.id, price);
        }
        self.orders.insert(order.id, order);
    }

    /// Re-index a restored trade for both participating orders
    pub fn restore_trade(&mut self, trade: Trade) {
        self.trades_by_order
            .entry(trade.buy_order_id)
            .or_default()
            .push(trade.clone());
        self.trades_by_order
            .entry(trade.sell_order_id)
            .or_default()
            .push(trade);
    }

    /// Seed a symbol's recent-trade ring, oldest price first
    pub fn restore_trade_prices(&mut self, symbol: Symbol, prices: Vec<Price>) {
        let mut ring = VecDeque::with_capacity(RECENT_TRADE_CAPACITY.min(prices.len()));
        for price in prices {
            if ring.len() == RECENT_TRADE_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(price);
        }
        self.trade_prices.insert(symbol, ring);
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Transition an open order to expired and purge it from its ladder
    fn expire_open_order(&mut self, order_id: OrderId) {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return;
        };
        order.status = OrderStatus::Expired;
        let update = OrderUpdate::of(order);
        let symbol = order.symbol.clone();
        let side = order.side;
        tracing::debug!(%order_id, %symbol, "purging expired resting order");
        if let Some(book) = self.books.get_mut(&symbol) {
            book.side_mut(side).remove(&order_id);
        }
        self.events.send(EngineEvent::OrderUpdate(update));
    }

    fn settle_balances(&mut self, buyer: BrokerId, seller: BrokerId, notional: i64) {
        if let Some(broker) = self.brokers.get_mut(&buyer) {
            broker.balance -= notional;
        }
        if let Some(broker) = self.brokers.get_mut(&seller) {
            broker.balance += notional;
        }
    }

    fn push_trade_price(&mut self, symbol: &Symbol, price: Price) {
        let ring = self
            .trade_prices
            .entry(symbol.clone())
            .or_insert_with(VecDeque::new);
        if ring.len() == RECENT_TRADE_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(price);
    }

    fn webhook_url_of(&self, broker_id: BrokerId) -> Option<String> {
        self.brokers
            .get(&broker_id)
            .and_then(|broker| broker.webhook_url.clone())
    }

    pub(crate) fn books(&self) -> &HashMap<Symbol, SymbolBook> {
        &self.books
    }

    pub(crate) fn orders_index(&self) -> &HashMap<OrderId, Order> {
        &self.orders
    }

    pub(crate) fn trade_prices(&self) -> &HashMap<Symbol, VecDeque<Price>> {
        &self.trade_prices
    }

    pub(crate) fn brokers_map(&self) -> &HashMap<BrokerId, BrokerState> {
        &self.brokers
    }
}
