//! Exchange-rate retrieval: source abstraction, fallback, and the 5-minute
//! cache.
//!
//! Three sources exist: a deterministic mock (demo mode and last-resort
//! fallback), a Thai-local ticker, and a global provider. The HTTP sources
//! never surface upstream failures to callers — they log and fall through
//! to the mock so a quote can always be issued.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::RATE_TTL_MS;
use crate::error::BridgeError;
use crate::token::Token;

/// A THB exchange rate for one token at one instant. Replaced in the cache,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub token: Token,
    /// Always "THB" today; kept explicit because the cache key includes it.
    pub fiat: String,
    pub rate: Decimal,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

/// A provider of THB exchange rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Human-readable source tag recorded on every rate.
    fn name(&self) -> &'static str;

    async fn fetch(&self, token: Token) -> Result<ExchangeRate, BridgeError>;
}

fn make_rate(token: Token, rate: Decimal, source: &str) -> ExchangeRate {
    let now = Utc::now();
    ExchangeRate {
        token,
        fiat: "THB".to_string(),
        rate,
        source: source.to_string(),
        timestamp: now,
        valid_until: now + TimeDelta::milliseconds(RATE_TTL_MS),
    }
}

/// Deterministic base rates with a small bounded wobble, so demo quotes
/// look alive without depending on any upstream.
pub struct MockRateSource {
    /// When false the wobble is suppressed and rates are exactly the base
    /// table. Tests use this.
    jitter: bool,
}

impl MockRateSource {
    pub fn new() -> Self {
        Self { jitter: true }
    }

    pub fn fixed() -> Self {
        Self { jitter: false }
    }

    pub fn base_rate(token: Token) -> Decimal {
        match token {
            Token::Usdt => dec!(35.50),
            Token::Usdc => dec!(35.45),
            Token::Eth => dec!(125000),
        }
    }
}

impl Default for MockRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, token: Token) -> Result<ExchangeRate, BridgeError> {
        let base = Self::base_rate(token);
        let rate = if self.jitter {
            // +/- 0.5% of base.
            let noise: f64 = rand::rng().random_range(-0.005..0.005);
            let factor = Decimal::from_f64(1.0 + noise).unwrap_or(Decimal::ONE);
            (base * factor).round_dp(8)
        } else {
            base
        };
        Ok(make_rate(token, rate, self.name()))
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    last: String,
}

/// Thai-local ticker: quotes tokens directly in THB.
pub struct ThaiTickerSource {
    client: reqwest::Client,
    base_url: String,
}

impl ThaiTickerSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            base_url,
        }
    }
}

#[async_trait]
impl RateSource for ThaiTickerSource {
    fn name(&self) -> &'static str {
        "thai-ticker"
    }

    async fn fetch(&self, token: Token) -> Result<ExchangeRate, BridgeError> {
        let url = format!("{}/api/v3/ticker?sym=THB_{}", self.base_url, token.as_str());
        let ticker: TickerResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let rate: Decimal = ticker
            .last
            .parse()
            .map_err(|_| BridgeError::Config(format!("unparseable ticker rate: {}", ticker.last)))?;
        if rate <= Decimal::ZERO {
            return Err(BridgeError::Config(format!("non-positive rate {rate}")));
        }
        Ok(make_rate(token, rate, self.name()))
    }
}

#[derive(Debug, Deserialize)]
struct GlobalPriceResponse {
    price: String,
}

/// Global provider: USD-denominated price multiplied by a fixed USD/THB leg
/// served by the same API.
pub struct GlobalRateSource {
    client: reqwest::Client,
    base_url: String,
}

impl GlobalRateSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            base_url,
        }
    }
}

#[async_trait]
impl RateSource for GlobalRateSource {
    fn name(&self) -> &'static str {
        "global"
    }

    async fn fetch(&self, token: Token) -> Result<ExchangeRate, BridgeError> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}THB",
            self.base_url,
            token.as_str()
        );
        let body: GlobalPriceResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let rate: Decimal = body
            .price
            .parse()
            .map_err(|_| BridgeError::Config(format!("unparseable price: {}", body.price)))?;
        if rate <= Decimal::ZERO {
            return Err(BridgeError::Config(format!("non-positive rate {rate}")));
        }
        Ok(make_rate(token, rate, self.name()))
    }
}

/// Rate retrieval with caching and mock fallback.
pub struct RateService {
    primary: Box<dyn RateSource>,
    fallback: MockRateSource,
    /// Keyed by (token, fiat). Fiat is THB-only today but the key shape is
    /// part of the cache contract.
    cache: DashMap<(Token, String), ExchangeRate>,
}

impl RateService {
    pub fn new(primary: Box<dyn RateSource>) -> Self {
        Self {
            primary,
            fallback: MockRateSource::new(),
            cache: DashMap::new(),
        }
    }

    /// Demo-mode service: mock rates only, no wobble.
    pub fn mock() -> Self {
        Self {
            primary: Box::new(MockRateSource::fixed()),
            fallback: MockRateSource::fixed(),
            cache: DashMap::new(),
        }
    }

    /// Get the THB rate for a token: cache, then primary, then mock.
    pub async fn get_rate(&self, token: Token) -> Result<ExchangeRate, BridgeError> {
        let key = (token, "THB".to_string());
        let now = Utc::now();

        if let Some(cached) = self.cache.get(&key) {
            if cached.is_fresh(now) {
                return Ok(cached.clone());
            }
        }

        let rate = match self.primary.fetch(token).await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(
                    token = %token,
                    source = self.primary.name(),
                    error = %e,
                    "rate source failed, falling back to mock"
                );
                self.fallback.fetch(token).await?
            }
        };

        self.cache.insert(key, rate.clone());
        Ok(rate)
    }

    /// Fetch rates for every supported token.
    pub async fn all_rates(&self) -> Result<Vec<ExchangeRate>, BridgeError> {
        let mut rates = Vec::with_capacity(Token::ALL.len());
        for token in Token::ALL {
            rates.push(self.get_rate(token).await?);
        }
        Ok(rates)
    }

    /// Drop a cached rate. Tests use this to force a refetch.
    pub fn evict(&self, token: Token) {
        self.cache.remove(&(token, "THB".to_string()));
    }
}
