//! Matching engine
//!
//! In-memory core of the exchange: per-symbol price ladders, the order and
//! trade indices, the broker registry, recent-trade rings, and the
//! price-time-priority match cascade that ties them together.
//!
//! All state lives behind a single writer. Mutations emit immutable event
//! snapshots on an in-process queue; a separate persistence crate drains
//! that queue into the durable store.

pub mod book;
pub mod engine;
pub mod events;
pub mod queries;

pub use engine::{CancelOutcome, Engine, LookupError, NewOrder, Submission};
pub use events::{event_channel, EngineEvent, EventReceiver, EventSender};
