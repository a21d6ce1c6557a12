//! Webhook dispatch
//!
//! After a batch commits, each trade is announced to both participating
//! brokers' endpoints. Delivery is at-most-once and best-effort: failures
//! are logged, never retried, and never surfaced to the submitting broker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use matching_engine::events::TradeSnapshot;
use types::ids::{OrderId, Symbol, TradeId};
use types::money::{Price, Quantity};
use types::order::Side;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// The `trade_executed` notification body
///
/// Field set and order are part of the broker-facing contract; do not
/// reorder.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event: &'static str,
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub order_remaining_quantity: Quantity,
    pub executed_at: DateTime<Utc>,
}

impl WebhookPayload {
    /// Payload for the buying broker
    pub fn for_buyer(snapshot: &TradeSnapshot) -> Self {
        Self {
            event: "trade_executed",
            trade_id: snapshot.trade.id,
            order_id: snapshot.trade.buy_order_id,
            symbol: snapshot.trade.symbol.clone(),
            side: Side::Bid,
            price: snapshot.trade.price,
            quantity: snapshot.trade.quantity,
            order_remaining_quantity: snapshot.buyer_remaining_quantity,
            executed_at: snapshot.trade.executed_at,
        }
    }

    /// Payload for the selling broker
    pub fn for_seller(snapshot: &TradeSnapshot) -> Self {
        Self {
            event: "trade_executed",
            trade_id: snapshot.trade.id,
            order_id: snapshot.trade.sell_order_id,
            symbol: snapshot.trade.symbol.clone(),
            side: Side::Ask,
            price: snapshot.trade.price,
            quantity: snapshot.trade.quantity,
            order_remaining_quantity: snapshot.seller_remaining_quantity,
            executed_at: snapshot.trade.executed_at,
        }
    }
}

/// Fire-and-forget webhook sender
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .expect("reqwest client construction");
        Self { client }
    }

    /// Notify both brokers of a committed trade
    ///
    /// The snapshot already carries the webhook URLs captured at execution
    /// time, so no registry read happens here.
    pub fn dispatch_trade(&self, snapshot: &TradeSnapshot) {
        if let Some(url) = &snapshot.buyer_webhook_url {
            self.post(url.clone(), WebhookPayload::for_buyer(snapshot));
        }
        if let Some(url) = &snapshot.seller_webhook_url {
            self.post(url.clone(), WebhookPayload::for_seller(snapshot));
        }
    }

    fn post(&self, url: String, payload: WebhookPayload) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(
                        url,
                        status = %response.status(),
                        "webhook delivery failed"
                    );
                }
                Err(error) => {
                    tracing::warn!(url, %error, "webhook delivery error");
                }
            }
        });
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
