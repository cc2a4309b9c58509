//! The top-level bridge context.
//!
//! One instance per process, passed by reference to every tool handler.
//! Holds exactly one object per capability and the shared stores; nothing
//! in the crate reaches for a global.

use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::mock::{MockBlockchain, MockSettlement};
use crate::network::NetworkDetector;
use crate::processor::QueueProcessor;
use crate::quote::QuoteIndex;
use crate::rates::{GlobalRateSource, RateService, ThaiTickerSource};
use crate::services::{Blockchain, Settlement};
use crate::settlement::HttpSettlement;
use crate::store::BridgeStore;
use crate::sync::SyncCoordinator;

pub struct BridgeContext {
    pub config: BridgeConfig,
    pub store: Arc<BridgeStore>,
    pub blockchain: Arc<dyn Blockchain>,
    pub settlement: Arc<dyn Settlement>,
    pub rates: Arc<RateService>,
    pub quotes: Arc<QuoteIndex>,
    pub network: Arc<NetworkDetector>,
    pub processor: Arc<QueueProcessor>,
    pub sync: Arc<SyncCoordinator>,
}

impl BridgeContext {
    /// Assemble a context around explicit capability implementations.
    pub fn new(
        config: BridgeConfig,
        blockchain: Arc<dyn Blockchain>,
        settlement: Arc<dyn Settlement>,
        rates: Arc<RateService>,
    ) -> Result<Self, BridgeError> {
        let store = Arc::new(BridgeStore::open(&config.db_path)?);
        let network = Arc::new(NetworkDetector::new(
            config.probe_endpoints.clone(),
            Some(Arc::clone(&store)),
        ));
        let processor = Arc::new(QueueProcessor::new(
            Arc::clone(&store),
            Arc::clone(&blockchain),
            Arc::clone(&settlement),
            Arc::clone(&network),
        ));
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&processor),
            Arc::clone(&network),
        ));

        Ok(Self {
            config,
            store,
            blockchain,
            settlement,
            rates,
            quotes: Arc::new(QuoteIndex::new()),
            network,
            processor,
            sync,
        })
    }

    /// Demo-mode context: every capability is a mock, rates come from the
    /// fixed table, and nothing leaves the process.
    pub fn demo(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::new(
            config,
            Arc::new(MockBlockchain::new()),
            Arc::new(MockSettlement::new()),
            Arc::new(RateService::mock()),
        )
    }

    /// Production wiring from configuration. Demo mode still short-circuits
    /// to mocks; otherwise the configured HTTP endpoints decide which rate
    /// source and settlement gateway are used.
    pub fn from_config(
        config: BridgeConfig,
        blockchain: Arc<dyn Blockchain>,
    ) -> Result<Self, BridgeError> {
        if config.demo_mode {
            return Self::demo(config);
        }

        let rates = match &config.exchange_api_url {
            Some(url) => Arc::new(RateService::new(Box::new(ThaiTickerSource::new(
                url.clone(),
            )))),
            None => Arc::new(RateService::new(Box::new(GlobalRateSource::new(
                "https://api.binance.com".to_string(),
            )))),
        };

        let settlement: Arc<dyn Settlement> = match &config.settlement_api_url {
            Some(url) => Arc::new(HttpSettlement::new(url.clone())),
            None => Arc::new(MockSettlement::new()),
        };

        Self::new(config, blockchain, settlement, rates)
    }

    /// Start background machinery and rebuild in-memory views from storage.
    /// Durable state is the single source of truth; anything cached is
    /// derived from this scan.
    pub fn start(&self) -> Result<(), BridgeError> {
        let active = self.store.active_orders()?;
        let queued = self.store.all_items()?;
        tracing::info!(
            active_orders = active.len(),
            queued_items = queued.len(),
            "bridge context starting"
        );

        self.network.start();
        if self.config.offline_queue_enabled {
            self.processor.start();
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.processor.stop();
        self.network.stop();
    }
}
