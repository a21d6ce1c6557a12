//! Persistence pipeline
//!
//! Converts the engine's in-memory mutations into batched durable writes,
//! and rebuilds memory from the durable store at startup.
//!
//! The write path is asynchronous by design: the engine acknowledges
//! requests before their events are flushed, so a crash can lose roughly
//! one flush interval of events. Memory remains authoritative while the
//! process lives; the store catches up every tick.

pub mod batch;
pub mod flusher;
pub mod recovery;
pub mod store;
pub mod webhook;

pub use batch::BatchPlan;
pub use flusher::{Flusher, FLUSH_INTERVAL_MS, MAX_BATCH, WAKE_THRESHOLD};
pub use recovery::{recover, RecoveryReport};
pub use store::{Store, StoreError};
pub use webhook::{WebhookDispatcher, WebhookPayload};
