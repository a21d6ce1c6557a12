//! Market data queries: aggregated book and recent prices

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use matching_engine::queries::{
    BookSnapshot, PriceStats, DEFAULT_BOOK_DEPTH, DEFAULT_PRICE_WINDOW, MAX_BOOK_DEPTH,
    MAX_PRICE_WINDOW,
};
use types::ids::Symbol;

use crate::auth::AuthenticatedBroker;
use crate::error::ApiError;
use crate::models::{BookQuery, PriceQuery};
use crate::state::AppState;

pub async fn get_order_book(
    State(state): State<AppState>,
    _broker: AuthenticatedBroker,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookSnapshot>, ApiError> {
    let depth = query.depth.unwrap_or(DEFAULT_BOOK_DEPTH);
    if depth == 0 || depth > MAX_BOOK_DEPTH {
        return Err(ApiError::Validation(format!(
            "depth must be between 1 and {MAX_BOOK_DEPTH}"
        )));
    }

    let symbol = Symbol::new(symbol);
    let engine = state.engine.lock().await;
    engine
        .book_snapshot(&symbol, depth, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Unknown symbol".to_string()))
}

pub async fn get_stock_price(
    State(state): State<AppState>,
    _broker: AuthenticatedBroker,
    Path(symbol): Path<String>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceStats>, ApiError> {
    let window = query.trades.unwrap_or(DEFAULT_PRICE_WINDOW);
    if window == 0 || window > MAX_PRICE_WINDOW {
        return Err(ApiError::Validation(format!(
            "trades must be between 1 and {MAX_PRICE_WINDOW}"
        )));
    }

    let symbol = Symbol::new(symbol);
    let engine = state.engine.lock().await;
    engine
        .price_stats(&symbol, window)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No trades found for symbol".to_string()))
}
