use std::sync::Arc;

use tokio::sync::Mutex;

use matching_engine::Engine;
use persistence::Store;

use crate::config::GatewayConfig;

/// Shared application state
///
/// The engine sits behind one async mutex: every mutation and query is
/// serialized through it, which is the single-writer discipline the core
/// depends on. Handlers release the lock before any store I/O.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<Engine>>,
    pub store: Store,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(engine: Engine, store: Store, config: GatewayConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            store,
            config: Arc::new(config),
        }
    }
}
