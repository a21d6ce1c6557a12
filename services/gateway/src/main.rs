mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;

use chrono::Utc;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use matching_engine::events::event_channel;
use persistence::{recover, Flusher, Store, WebhookDispatcher, WAKE_THRESHOLD};

use config::GatewayConfig;
use router::create_router;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env();
    tracing::info!("starting exchange gateway");

    let store = Store::connect(&config.database_url).await?;
    store.ensure_schema().await?;

    // Recovery runs to completion before the listener binds, so no request
    // ever observes a half-built engine
    let (events, event_rx) = event_channel(WAKE_THRESHOLD);
    let (engine, report) = recover(&store, events, Utc::now()).await?;
    tracing::info!(
        brokers = report.brokers,
        open_orders = report.open_orders,
        trades = report.trades,
        symbols = report.symbols_with_prices,
        "recovery complete"
    );

    tokio::spawn(Flusher::new(store.clone(), event_rx, WebhookDispatcher::new()).run());
    tracing::info!("persistence flusher started");

    let bind_addr: SocketAddr = config.bind_addr.parse()?;
    let state = AppState::new(engine, store, config);
    let app = create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
