//! The offline-queue processor: broadcast, confirm, settle, retry.
//!
//! One drain runs at a time (a compare-and-swap gate turns concurrent
//! invocations into no-ops). The background loop wakes on a ten-second
//! ticker, on enqueue while the network is up, and on every transition into
//! ONLINE. Each step of the per-item pipeline is safe under replay:
//! broadcasting an already-broadcast transaction reuses its hash, and the
//! settlement capability is idempotent on the order id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::Notify;

use crate::error::BridgeError;
use crate::network::{NetworkDetector, NetworkStatus};
use crate::order::{PaymentOrder, PaymentStatus};
use crate::services::{Blockchain, Settlement};
use crate::store::{BridgeStore, OfflineQueueItem};

/// Ticker cadence for the background drain loop.
pub const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Base retry delay.
pub const BASE_RETRY_DELAY_MS: i64 = 5_000;

/// Retry delay ceiling.
pub const MAX_RETRY_DELAY_MS: i64 = 300_000;

/// Attempts before an item is written off.
pub const MAX_RETRIES: u32 = 5;

/// Confirmations required before settlement.
pub const REQUIRED_CONFIRMATIONS: u64 = 3;

/// How long to wait for those confirmations.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Exponential backoff: `min(5s * 2^(retry_count - 1), 5min)`.
pub fn backoff_delay(retry_count: u32) -> TimeDelta {
    let exponent = retry_count.saturating_sub(1).min(16);
    let delay = BASE_RETRY_DELAY_MS.saturating_mul(1i64 << exponent);
    TimeDelta::milliseconds(delay.min(MAX_RETRY_DELAY_MS))
}

/// Outcome of a single drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items that completed end to end.
    pub processed: usize,
    /// Items rescheduled for a later attempt.
    pub retried: usize,
    /// Items written off after exhausting retries.
    pub failed: usize,
}

pub struct QueueProcessor {
    store: Arc<BridgeStore>,
    blockchain: Arc<dyn Blockchain>,
    settlement: Arc<dyn Settlement>,
    network: Arc<NetworkDetector>,
    draining: AtomicBool,
    running: AtomicBool,
    wake: Notify,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<BridgeStore>,
        blockchain: Arc<dyn Blockchain>,
        settlement: Arc<dyn Settlement>,
        network: Arc<NetworkDetector>,
    ) -> Self {
        Self {
            store,
            blockchain,
            settlement,
            network,
            draining: AtomicBool::new(false),
            running: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Called by the confirm path after persisting a new queue item. While
    /// the network is up this triggers an immediate drain.
    pub async fn on_enqueued(&self) -> Result<DrainReport, BridgeError> {
        if self.network.current() == NetworkStatus::Online {
            self.process_queue().await
        } else {
            self.wake.notify_one();
            Ok(DrainReport::default())
        }
    }

    /// Drain every ready item. Returns immediately with an empty report if
    /// a drain is already in flight.
    pub async fn process_queue(&self) -> Result<DrainReport, BridgeError> {
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain already in flight, skipping");
            return Ok(DrainReport::default());
        }
        let report = self.drain().await;
        self.draining.store(false, Ordering::SeqCst);
        report
    }

    async fn drain(&self) -> Result<DrainReport, BridgeError> {
        let mut report = DrainReport::default();
        let items = self.store.ready_items(Utc::now())?;
        if items.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = items.len(), "draining offline queue");

        for item in items {
            // Connectivity can vanish mid-drain; leave the rest queued.
            if !self.network.current().can_broadcast() {
                tracing::info!("network dropped to OFFLINE, stopping drain");
                break;
            }

            match self.process_item(&item).await {
                Ok(()) => report.processed += 1,
                Err(reason) => {
                    if self.schedule_retry(&item, &reason)? {
                        report.retried += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Run one item through broadcast -> confirm -> settle -> complete.
    /// The returned string is the retry reason.
    async fn process_item(&self, item: &OfflineQueueItem) -> Result<(), String> {
        let mut order = self
            .store
            .get_order(&item.order_id)
            .map_err(|e| format!("order load failed: {e}"))?
            .ok_or_else(|| format!("order {} missing", item.order_id))?;

        // A crash between completion and dequeue leaves a finished order
        // behind a live queue row; just drop the row.
        if order.status == PaymentStatus::Completed {
            self.store
                .dequeue(&item.id)
                .map_err(|e| format!("dequeue failed: {e}"))?;
            return Ok(());
        }

        // A replayed item may already be PENDING; only advance when needed.
        if order.status == PaymentStatus::Signed {
            order
                .transition(PaymentStatus::Pending)
                .map_err(|e| e.to_string())?;
            self.store
                .update_order(&order)
                .map_err(|e| format!("persist failed: {e}"))?;
        }

        let tx_hash = match &order.tx_hash {
            Some(hash) => hash.clone(),
            None => {
                let hash = self
                    .blockchain
                    .broadcast_transaction(&item.signed_tx_blob)
                    .await
                    .map_err(|e| format!("Broadcast failed: {e}"))?;
                tracing::info!(order = %order.id, tx = %hash, "transaction broadcast");
                order.tx_hash = Some(hash.clone());
                order.updated_at = Utc::now();
                self.store
                    .update_order(&order)
                    .map_err(|e| format!("persist failed: {e}"))?;
                hash
            }
        };

        let confirmed = self
            .blockchain
            .wait_for_confirmation(&tx_hash, REQUIRED_CONFIRMATIONS, CONFIRMATION_TIMEOUT)
            .await
            .map_err(|e| format!("Confirmation check failed: {e}"))?;
        if !confirmed {
            return Err("Transaction not confirmed".to_string());
        }

        if order.status == PaymentStatus::Pending {
            order
                .transition(PaymentStatus::Settled)
                .map_err(|e| e.to_string())?;
            self.store
                .update_order(&order)
                .map_err(|e| format!("persist failed: {e}"))?;
        }

        let receipt = self
            .settlement
            .settle(&order)
            .await
            .map_err(|e| format!("Settlement failed: {e}"))?;
        if !receipt.success {
            return Err("Settlement failed".to_string());
        }

        order.settlement_id = receipt.settlement_id;
        order
            .transition(PaymentStatus::Completed)
            .map_err(|e| e.to_string())?;
        self.store
            .update_order(&order)
            .map_err(|e| format!("persist failed: {e}"))?;
        self.store
            .dequeue(&item.id)
            .map_err(|e| format!("dequeue failed: {e}"))?;

        tracing::info!(
            order = %order.id,
            tx = %tx_hash,
            settlement = order.settlement_id.as_deref().unwrap_or("?"),
            "payment completed"
        );
        Ok(())
    }

    /// Reschedule or write off a failed item. Returns true when the item
    /// stays queued for another attempt.
    fn schedule_retry(
        &self,
        item: &OfflineQueueItem,
        reason: &str,
    ) -> Result<bool, BridgeError> {
        let retry_count = item.retry_count + 1;

        if retry_count >= MAX_RETRIES {
            tracing::warn!(
                order = %item.order_id,
                retries = retry_count,
                reason,
                "queue item exhausted retries"
            );
            if let Some(mut order) = self.store.get_order(&item.order_id)? {
                self.fail_order(&mut order, &format!("Max retries exceeded: {reason}"))?;
            }
            self.store.dequeue(&item.id)?;
            return Ok(false);
        }

        let now = Utc::now();
        let delay = backoff_delay(retry_count);
        tracing::info!(
            order = %item.order_id,
            retry = retry_count,
            delay_ms = delay.num_milliseconds(),
            reason,
            "scheduling retry"
        );
        self.store
            .update_retry(&item.id, retry_count, now, now + delay)?;
        Ok(true)
    }

    fn fail_order(&self, order: &mut PaymentOrder, reason: &str) -> Result<(), BridgeError> {
        let state = match order.status {
            PaymentStatus::Pending => PaymentStatus::Failed,
            PaymentStatus::Settled => PaymentStatus::Failed,
            PaymentStatus::Signed => PaymentStatus::Failed,
            // Already terminal: keep the first failure reason.
            _ => return Ok(()),
        };
        order.fail(state, reason)?;
        self.store.update_order(order)
    }

    /// Start the background loop: tick, wake on demand, and drain on every
    /// transition into ONLINE.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("queue processor already running");
            return;
        }

        let processor = Arc::clone(self);
        let mut network_events = self.network.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            tracing::info!("queue processor started");

            while processor.running.load(Ordering::SeqCst) {
                let should_drain = tokio::select! {
                    _ = ticker.tick() => true,
                    _ = processor.wake.notified() => true,
                    event = network_events.recv() => match event {
                        Ok(change) => change.new == NetworkStatus::Online,
                        Err(_) => false,
                    },
                };

                if !should_drain || !processor.network.current().can_broadcast() {
                    continue;
                }
                if let Err(e) = processor.process_queue().await {
                    tracing::error!(error = %e, "queue drain failed");
                }
            }
            tracing::info!("queue processor stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}
