//! Network-quality detection.
//!
//! A fixed set of endpoints is probed on an interval; the success count and
//! average latency aggregate to a three-level status. Interested parties
//! subscribe for `(old, new)` change events; the queue processor uses the
//! transition into ONLINE as its wake signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::store::BridgeStore;

/// Probe cadence.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Per-probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Average latency above this is WEAK even when most probes succeed.
pub const WEAK_LATENCY_MS: u128 = 2_000;

/// Three-level connection quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    Online,
    Weak,
    Offline,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStatus::Online => "ONLINE",
            NetworkStatus::Weak => "WEAK",
            NetworkStatus::Offline => "OFFLINE",
        }
    }

    /// Whether queued work may be attempted at this quality.
    pub fn can_broadcast(&self) -> bool {
        !matches!(self, NetworkStatus::Offline)
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change event.
#[derive(Debug, Clone, Copy)]
pub struct NetworkChange {
    pub old: NetworkStatus,
    pub new: NetworkStatus,
}

/// Aggregate probe results into a status.
///
/// No successes is OFFLINE. Fewer than half the endpoints reachable, or a
/// sluggish average, is WEAK. Everything else is ONLINE.
pub fn classify(success_count: usize, endpoint_count: usize, avg_latency_ms: u128) -> NetworkStatus {
    if success_count == 0 {
        return NetworkStatus::Offline;
    }
    let majority = endpoint_count.div_ceil(2);
    if success_count < majority || avg_latency_ms > WEAK_LATENCY_MS {
        return NetworkStatus::Weak;
    }
    NetworkStatus::Online
}

/// The detector. One per process, lifecycle-managed with
/// [`NetworkDetector::start`] / [`NetworkDetector::stop`].
pub struct NetworkDetector {
    endpoints: Vec<String>,
    client: reqwest::Client,
    status: RwLock<NetworkStatus>,
    events: broadcast::Sender<NetworkChange>,
    running: AtomicBool,
    store: Option<Arc<BridgeStore>>,
}

impl NetworkDetector {
    pub fn new(endpoints: Vec<String>, store: Option<Arc<BridgeStore>>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            endpoints,
            client: reqwest::Client::builder()
                .timeout(PROBE_TIMEOUT)
                .build()
                .expect("reqwest client"),
            // Assume connectivity until the first probe says otherwise, so a
            // fresh process does not refuse work for its first ten seconds.
            status: RwLock::new(NetworkStatus::Online),
            events,
            running: AtomicBool::new(false),
            store,
        }
    }

    pub fn current(&self) -> NetworkStatus {
        *self.status.read().expect("status lock")
    }

    /// Subscribe to status changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkChange> {
        self.events.subscribe()
    }

    /// Apply a new status, notifying subscribers and the audit log when it
    /// differs from the current one. The probe loop calls this; tests and
    /// demo tooling may call it directly.
    pub fn set_status(&self, new: NetworkStatus) {
        let old = {
            let mut status = self.status.write().expect("status lock");
            let old = *status;
            *status = new;
            old
        };
        if old == new {
            return;
        }

        tracing::info!(old = %old, new = %new, "network status changed");
        if let Some(store) = &self.store {
            if let Err(e) = store.log_network_change(old, new) {
                tracing::warn!(error = %e, "failed to record network change");
            }
        }
        let _ = self.events.send(NetworkChange { old, new });
    }

    /// Probe every endpoint once and classify the result.
    pub async fn probe_once(&self) -> NetworkStatus {
        let mut successes = 0usize;
        let mut total_latency_ms = 0u128;

        for endpoint in &self.endpoints {
            let started = std::time::Instant::now();
            match self.client.get(endpoint).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    successes += 1;
                    total_latency_ms += started.elapsed().as_millis();
                }
                Ok(resp) => {
                    tracing::debug!(endpoint, status = %resp.status(), "probe got error status");
                }
                Err(e) => {
                    tracing::debug!(endpoint, error = %e, "probe failed");
                }
            }
        }

        let avg_latency_ms = if successes > 0 {
            total_latency_ms / successes as u128
        } else {
            0
        };
        classify(successes, self.endpoints.len(), avg_latency_ms)
    }

    /// Start the background probe loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("network detector already running");
            return;
        }

        let detector = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROBE_INTERVAL);
            tracing::info!(
                endpoints = detector.endpoints.len(),
                "network detector started"
            );
            while detector.running.load(Ordering::SeqCst) {
                interval.tick().await;
                let status = detector.probe_once().await;
                detector.set_status(status);
            }
            tracing::info!("network detector stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_offline() {
        assert_eq!(classify(0, 3, 0), NetworkStatus::Offline);
    }

    #[test]
    fn test_classify_weak_minority() {
        // ceil(3/2) = 2; one success is a minority.
        assert_eq!(classify(1, 3, 100), NetworkStatus::Weak);
    }

    #[test]
    fn test_classify_weak_latency() {
        assert_eq!(classify(3, 3, 2_001), NetworkStatus::Weak);
        assert_eq!(classify(3, 3, 2_000), NetworkStatus::Online);
    }

    #[test]
    fn test_classify_online() {
        assert_eq!(classify(2, 3, 150), NetworkStatus::Online);
        assert_eq!(classify(3, 3, 150), NetworkStatus::Online);
    }

    #[test]
    fn test_classify_single_endpoint() {
        assert_eq!(classify(1, 1, 100), NetworkStatus::Online);
        assert_eq!(classify(0, 1, 0), NetworkStatus::Offline);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let detector = NetworkDetector::new(vec![], None);
        let mut rx = detector.subscribe();

        detector.set_status(NetworkStatus::Offline);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.old, NetworkStatus::Online);
        assert_eq!(change.new, NetworkStatus::Offline);

        detector.set_status(NetworkStatus::Online);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.new, NetworkStatus::Online);
    }

    #[tokio::test]
    async fn test_no_event_without_change() {
        let detector = NetworkDetector::new(vec![], None);
        let mut rx = detector.subscribe();

        detector.set_status(NetworkStatus::Online); // already online
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_audit_log_written() {
        let store = Arc::new(BridgeStore::open(":memory:").unwrap());
        let detector = NetworkDetector::new(vec![], Some(Arc::clone(&store)));

        detector.set_status(NetworkStatus::Weak);
        detector.set_status(NetworkStatus::Offline);

        let log = store.recent_network_changes(10).unwrap();
        assert_eq!(log.len(), 2);
    }
}
