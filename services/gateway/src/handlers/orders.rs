//! Order submission, lookup, and cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use matching_engine::{CancelOutcome, LookupError};
use types::ids::OrderId;

use crate::auth::AuthenticatedBroker;
use crate::error::ApiError;
use crate::models::{CreateOrderRequest, OrderCreated, OrderDetailResponse};
use crate::state::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    broker: AuthenticatedBroker,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), ApiError> {
    let now = Utc::now();
    let request = body.into_new_order(broker.broker_id, now)?;

    let submission = {
        let mut engine = state.engine.lock().await;
        engine.submit(request, now)
    };

    Ok((
        StatusCode::CREATED,
        Json(OrderCreated {
            order_id: submission.order_id,
        }),
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    broker: AuthenticatedBroker,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let order_id = OrderId::from_uuid(order_id);
    let now = Utc::now();

    let memory_result = {
        let mut engine = state.engine.lock().await;
        engine.order_detail(broker.broker_id, order_id, now)
    };

    match memory_result {
        Ok(detail) => Ok(Json(detail.into())),
        Err(LookupError::Forbidden) => Err(ApiError::Forbidden(
            "Order belongs to a different broker".to_string(),
        )),
        // Pre-restart orders are only in the durable store; one-shot fetch
        Err(LookupError::NotFound) => {
            let order = state
                .store
                .fetch_order(order_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
            if order.broker_id != broker.broker_id {
                return Err(ApiError::Forbidden(
                    "Order belongs to a different broker".to_string(),
                ));
            }
            let trades = state.store.fetch_trade_details(order_id).await?;
            Ok(Json(OrderDetailResponse::from_parts(order, trades)))
        }
    }
}

pub async fn cancel_order(
    State(state): State<AppState>,
    broker: AuthenticatedBroker,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let order_id = OrderId::from_uuid(order_id);

    let outcome = {
        let mut engine = state.engine.lock().await;
        engine.cancel(broker.broker_id, order_id)
    };

    match outcome {
        CancelOutcome::Cancelled | CancelOutcome::Noop => Ok(StatusCode::NO_CONTENT),
        CancelOutcome::NotOwner if state.config.strict_cancel_ownership => Err(
            ApiError::Forbidden("Order belongs to a different broker".to_string()),
        ),
        // Default policy: indistinguishable from cancelling an unknown order
        CancelOutcome::NotOwner => Ok(StatusCode::NO_CONTENT),
    }
}
