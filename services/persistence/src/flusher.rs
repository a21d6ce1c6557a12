//! Background flusher
//!
//! Drains the engine's event queue and commits each drained batch in one
//! store transaction. Wakes on a fixed interval or when the queue crosses
//! its batch threshold, whichever comes first. A batch that fails to
//! commit is held and retried next tick; memory remains authoritative, so
//! nothing is lost while the process lives.

use std::time::Duration;

use matching_engine::events::EventReceiver;

use crate::batch::BatchPlan;
use crate::store::Store;
use crate::webhook::WebhookDispatcher;

/// Flush cadence when the queue stays below the wake threshold
pub const FLUSH_INTERVAL_MS: u64 = 30;
/// Most events drained into a single transaction
pub const MAX_BATCH: usize = 1024;
/// Queue depth that wakes the flusher before its next tick
pub const WAKE_THRESHOLD: usize = 512;

pub struct Flusher {
    store: Store,
    events: EventReceiver,
    webhooks: WebhookDispatcher,
    interval: Duration,
    max_batch: usize,
}

impl Flusher {
    pub fn new(store: Store, events: EventReceiver, webhooks: WebhookDispatcher) -> Self {
        Self {
            store,
            events,
            webhooks,
            interval: Duration::from_millis(FLUSH_INTERVAL_MS),
            max_batch: MAX_BATCH,
        }
    }

    /// Run until every sender is dropped and the queue is drained
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.events.threshold_reached() => {}
            }

            let drained = self.events.drain(self.max_batch);
            if !drained.events.is_empty() {
                let plan = BatchPlan::build(drained.events);
                self.flush_until_committed(&plan).await;
            }

            if drained.disconnected {
                self.final_drain().await;
                tracing::info!("event queue closed, persistence flusher stopping");
                return;
            }
        }
    }

    /// Commit one plan, retrying on the tick cadence until it lands
    ///
    /// Events already drained are never re-queued; the plan is the unit of
    /// retry, so the durable write order stays identical across attempts.
    async fn flush_until_committed(&self, plan: &BatchPlan) {
        loop {
            match self.store.apply_batch(plan).await {
                Ok(()) => {
                    tracing::debug!(rows = plan.row_count(), "batch committed");
                    for snapshot in &plan.trades {
                        self.webhooks.dispatch_trade(snapshot);
                    }
                    return;
                }
                Err(error) => {
                    tracing::error!(
                        %error,
                        rows = plan.row_count(),
                        "persistence flush failed, retrying next tick"
                    );
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }

    /// Shutdown path: push out whatever is still queued
    async fn final_drain(&mut self) {
        loop {
            let remainder = self.events.drain(self.max_batch);
            if remainder.events.is_empty() {
                return;
            }
            let plan = BatchPlan::build(remainder.events);
            self.flush_until_committed(&plan).await;
        }
    }
}
