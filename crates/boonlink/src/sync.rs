//! Forced synchronization and storage hygiene.
//!
//! `force_sync` is the user-facing "drain now" entrypoint: it refuses to
//! overlap itself, refuses to run offline, and narrates progress through a
//! broadcast channel so a chat surface can render a progress card.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::BridgeError;
use crate::network::NetworkDetector;
use crate::processor::QueueProcessor;
use crate::store::{days_ago, BridgeStore};

/// Progress events emitted by a sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    SyncStarted {
        total: usize,
    },
    SyncProgress {
        total: usize,
        processed: usize,
        failed: usize,
    },
    SyncCompleted {
        total: usize,
        processed: usize,
        failed: usize,
    },
    SyncFailed {
        error: String,
    },
}

/// Summary returned to the caller of [`SyncCoordinator::force_sync`].
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

pub struct SyncCoordinator {
    store: Arc<BridgeStore>,
    processor: Arc<QueueProcessor>,
    network: Arc<NetworkDetector>,
    syncing: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<BridgeStore>,
        processor: Arc<QueueProcessor>,
        network: Arc<NetworkDetector>,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            store,
            processor,
            network,
            syncing: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    /// Drain the queue now. Refuses while a sync is already running and
    /// while the network is OFFLINE.
    pub async fn force_sync(&self) -> Result<SyncReport, BridgeError> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::SyncInProgress);
        }
        let result = self.run_sync().await;
        self.syncing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_sync(&self) -> Result<SyncReport, BridgeError> {
        if !self.network.current().can_broadcast() {
            self.emit(SyncEvent::SyncFailed {
                error: BridgeError::NetworkOffline.to_string(),
            });
            return Err(BridgeError::NetworkOffline);
        }

        let total = self.store.ready_items(Utc::now())?.len();
        self.emit(SyncEvent::SyncStarted { total });
        tracing::info!(total, "forced sync started");

        match self.processor.process_queue().await {
            Ok(drain) => {
                let report = SyncReport {
                    total,
                    processed: drain.processed,
                    failed: drain.failed,
                };
                self.emit(SyncEvent::SyncProgress {
                    total,
                    processed: drain.processed,
                    failed: drain.failed,
                });
                self.emit(SyncEvent::SyncCompleted {
                    total,
                    processed: drain.processed,
                    failed: drain.failed,
                });
                tracing::info!(
                    total,
                    processed = drain.processed,
                    failed = drain.failed,
                    "forced sync completed"
                );
                Ok(report)
            }
            Err(e) => {
                self.emit(SyncEvent::SyncFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Delete COMPLETED orders older than `older_than_days`. Returns the
    /// number removed.
    pub fn cleanup_old_orders(&self, older_than_days: i64) -> Result<usize, BridgeError> {
        let removed = self.store.delete_completed_before(days_ago(older_than_days))?;
        if removed > 0 {
            tracing::info!(removed, older_than_days, "cleaned up completed orders");
        }
        Ok(removed)
    }
}
