//! Request and response schemas
//!
//! Admission validation lives here, before anything reaches the engine: a
//! rejected submission mutates no state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matching_engine::engine::{NewOrder, OrderDetail, TradeDetail};
use types::ids::{BrokerId, OrderId, TradeId};
use types::money::{Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side};

use crate::error::ApiError;

const MAX_DOCUMENT_NUMBER_LEN: usize = 20;
const MAX_SYMBOL_LEN: usize = 10;
const MAX_BROKER_NAME_LEN: usize = 100;

fn default_order_type() -> OrderType {
    OrderType::Limit
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub document_number: String,
    pub side: Side,
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,
    pub symbol: String,
    pub price: Option<i64>,
    pub quantity: i64,
    pub valid_until: Option<DateTime<Utc>>,
}

impl CreateOrderRequest {
    /// Validate admission rules and build the engine submission
    pub fn into_new_order(
        self,
        broker_id: BrokerId,
        now: DateTime<Utc>,
    ) -> Result<NewOrder, ApiError> {
        if self.document_number.is_empty()
            || self.document_number.len() > MAX_DOCUMENT_NUMBER_LEN
        {
            return Err(ApiError::Validation(
                "document_number must be 1-20 characters".to_string(),
            ));
        }
        let symbol = self.symbol.trim();
        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return Err(ApiError::Validation(
                "symbol must be 1-10 characters".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(ApiError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        let (price, valid_until) = match self.order_type {
            OrderType::Limit => {
                let price = self.price.ok_or_else(|| {
                    ApiError::Validation("Limit orders require a price".to_string())
                })?;
                if price <= 0 {
                    return Err(ApiError::Validation("price must be positive".to_string()));
                }
                let valid_until = self.valid_until.ok_or_else(|| {
                    ApiError::Validation("Limit orders require valid_until".to_string())
                })?;
                if valid_until <= now {
                    return Err(ApiError::Validation(
                        "valid_until must be in the future".to_string(),
                    ));
                }
                (Some(Price::from_cents(price)), Some(valid_until))
            }
            OrderType::Market => {
                if self.price.is_some() {
                    return Err(ApiError::Validation(
                        "Market orders must not have a price".to_string(),
                    ));
                }
                (None, None)
            }
        };

        Ok(NewOrder {
            broker_id,
            document_number: self.document_number,
            side: self.side,
            order_type: self.order_type,
            symbol: symbol.into(),
            price,
            quantity: Quantity::new(self.quantity),
            valid_until,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct TradeInfo {
    pub trade_id: TradeId,
    pub price: Price,
    pub quantity: Quantity,
    pub counterparty_broker: String,
    pub executed_at: DateTime<Utc>,
}

impl From<TradeDetail> for TradeInfo {
    fn from(detail: TradeDetail) -> Self {
        Self {
            trade_id: detail.trade_id,
            price: detail.price,
            quantity: detail.quantity,
            counterparty_broker: detail.counterparty_broker,
            executed_at: detail.executed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub symbol: String,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub status: OrderStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub trades: Vec<TradeInfo>,
}

impl OrderDetailResponse {
    pub fn from_parts(order: Order, trades: Vec<TradeDetail>) -> Self {
        Self {
            id: order.id,
            side: order.side,
            order_type: order.order_type,
            symbol: order.symbol.as_str().to_string(),
            price: order.price,
            quantity: order.quantity,
            remaining_quantity: order.remaining_quantity,
            status: order.status,
            valid_until: order.valid_until,
            created_at: order.created_at,
            trades: trades.into_iter().map(TradeInfo::from).collect(),
        }
    }
}

impl From<OrderDetail> for OrderDetailResponse {
    fn from(detail: OrderDetail) -> Self {
        Self::from_parts(detail.order, detail.trades)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterBrokerRequest {
    pub name: String,
    pub webhook_url: Option<String>,
}

impl RegisterBrokerRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() || self.name.len() > MAX_BROKER_NAME_LEN {
            return Err(ApiError::Validation(
                "name must be 1-100 characters".to_string(),
            ));
        }
        if let Some(url) = &self.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ApiError::Validation(
                    "webhook_url must be an http(s) URL".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct BrokerRegistered {
    pub broker_id: BrokerId,
    /// Returned exactly once; only its hash is stored
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BookQuery {
    pub depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    /// Window size; the parameter is named after what it counts
    pub trades: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn limit_request() -> CreateOrderRequest {
        CreateOrderRequest {
            document_number: "12345678901".to_string(),
            side: Side::Bid,
            order_type: OrderType::Limit,
            symbol: "petr4".to_string(),
            price: Some(3500),
            quantity: 100,
            valid_until: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[test]
    fn test_valid_limit_order() {
        let request = limit_request();
        let order = request.into_new_order(BrokerId::new(), Utc::now()).unwrap();
        assert_eq!(order.symbol.as_str(), "PETR4");
        assert_eq!(order.price, Some(Price::from_cents(3500)));
        assert_eq!(order.quantity, Quantity::new(100));
    }

    #[test]
    fn test_limit_requires_price() {
        let mut request = limit_request();
        request.price = None;
        let error = request.into_new_order(BrokerId::new(), Utc::now()).unwrap_err();
        assert!(matches!(error, ApiError::Validation(_)));
    }

    #[test]
    fn test_limit_rejects_nonpositive_price() {
        let mut request = limit_request();
        request.price = Some(0);
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_limit_requires_future_valid_until() {
        let now = Utc::now();
        let mut request = limit_request();
        request.valid_until = Some(now);
        assert!(request.into_new_order(BrokerId::new(), now).is_err());

        let mut request = limit_request();
        request.valid_until = None;
        assert!(request.into_new_order(BrokerId::new(), now).is_err());
    }

    #[test]
    fn test_market_rejects_price() {
        let mut request = limit_request();
        request.order_type = OrderType::Market;
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_market_order_drops_validity() {
        let mut request = limit_request();
        request.order_type = OrderType::Market;
        request.price = None;
        let order = request.into_new_order(BrokerId::new(), Utc::now()).unwrap();
        assert_eq!(order.price, None);
        assert_eq!(order.valid_until, None);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let mut request = limit_request();
        request.quantity = 0;
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_symbol_length_bounds() {
        let mut request = limit_request();
        request.symbol = "".to_string();
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());

        let mut request = limit_request();
        request.symbol = "ABCDEFGHIJK".to_string();
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_document_number_bounds() {
        let mut request = limit_request();
        request.document_number = "x".repeat(21);
        assert!(request.into_new_order(BrokerId::new(), Utc::now()).is_err());
    }

    #[test]
    fn test_register_broker_validation() {
        let valid = RegisterBrokerRequest {
            name: "Acme".to_string(),
            webhook_url: Some("https://acme.example/hook".to_string()),
        };
        assert!(valid.validate().is_ok());

        let bad_url = RegisterBrokerRequest {
            name: "Acme".to_string(),
            webhook_url: Some("ftp://acme.example".to_string()),
        };
        assert!(bad_url.validate().is_err());

        let empty_name = RegisterBrokerRequest {
            name: String::new(),
            webhook_url: None,
        };
        assert!(empty_name.validate().is_err());
    }
}
