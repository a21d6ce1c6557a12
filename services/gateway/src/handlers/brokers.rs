//! Broker registration and balance

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use uuid::Uuid;

use matching_engine::queries::BalanceView;
use types::broker::Broker;

use crate::auth::{hash_api_key, AdminAuth, AuthenticatedBroker};
use crate::error::ApiError;
use crate::models::{BrokerRegistered, RegisterBrokerRequest};
use crate::state::AppState;

pub async fn register_broker(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Json(body): Json<RegisterBrokerRequest>,
) -> Result<(StatusCode, Json<BrokerRegistered>), ApiError> {
    body.validate()?;

    // The raw key is handed back once; only its hash survives
    let api_key = format!("key-{}", Uuid::new_v4());
    let broker = Broker::new(
        body.name,
        hash_api_key(&api_key),
        body.webhook_url,
        Utc::now(),
    );

    // Registration is rare: written through synchronously, then mirrored
    // into memory so the key works immediately
    state.store.insert_broker(&broker).await?;
    {
        let mut engine = state.engine.lock().await;
        engine.register_broker(&broker);
    }
    tracing::info!(broker_id = %broker.id, name = %broker.name, "registered broker");

    Ok((
        StatusCode::CREATED,
        Json(BrokerRegistered {
            broker_id: broker.id,
            api_key,
        }),
    ))
}

pub async fn get_balance(
    State(state): State<AppState>,
    broker: AuthenticatedBroker,
) -> Result<Json<BalanceView>, ApiError> {
    let engine = state.engine.lock().await;
    engine
        .balance(broker.broker_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Broker not found".to_string()))
}
