//! Broker records

use crate::ids::BrokerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered broker
///
/// `balance` is cumulative signed cents over all executed trades:
/// sells credit, buys debit. Brokers are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub name: String,
    /// SHA-256 hex digest of the broker's API key
    pub api_key_hash: String,
    pub webhook_url: Option<String>,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Broker {
    pub fn new(
        name: impl Into<String>,
        api_key_hash: impl Into<String>,
        webhook_url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BrokerId::new(),
            name: name.into(),
            api_key_hash: api_key_hash.into(),
            webhook_url,
            balance: 0,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_broker_starts_flat() {
        let broker = Broker::new("Acme Investments", "ab".repeat(32), None, Utc::now());
        assert_eq!(broker.balance, 0);
        assert!(broker.webhook_url.is_none());
    }
}
