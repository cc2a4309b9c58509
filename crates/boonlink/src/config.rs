//! Bridge configuration from environment variables.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::BridgeError;
use crate::token::Token;

/// BSC mainnet chain id.
pub const BSC_CHAIN_ID: u64 = 56;

/// Default public BSC RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org";

/// EIP-712 domain name for offline payment authorizations.
pub const EIP712_DOMAIN_NAME: &str = "BoonLink Payment";

/// EIP-712 domain version.
pub const EIP712_DOMAIN_VERSION: &str = "1";

/// How long an issued quote stays confirmable.
pub const QUOTE_TTL_MS: i64 = 180_000;

/// How long a cached exchange rate stays valid.
pub const RATE_TTL_MS: i64 = 300_000;

/// Runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// When true, every capability is backed by a mock (no network, no keys).
    pub demo_mode: bool,
    /// Token offered when the caller does not pick one.
    pub default_token: Token,
    /// Upper bound for a single quote, in THB.
    pub max_amount_thb: Decimal,
    /// Whether signed transactions are queued for later broadcast when the
    /// network is down. When false, confirm fails fast on OFFLINE.
    pub offline_queue_enabled: bool,
    /// Thai-local ticker endpoint. Absent = mock rates.
    pub exchange_api_url: Option<String>,
    /// Fiat settlement gateway endpoint. Absent = mock settlement.
    pub settlement_api_url: Option<String>,
    /// BSC RPC endpoint.
    pub rpc_url: String,
    /// Address that receives the crypto leg of every payment.
    pub collection_address: Option<Address>,
    /// EIP-712 verifying contract. Zero address by default.
    pub verifying_contract: Address,
    /// SQLite database path.
    pub db_path: String,
    /// Endpoints probed by the network-quality detector.
    pub probe_endpoints: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            demo_mode: true,
            default_token: Token::Usdt,
            max_amount_thb: dec!(10000),
            offline_queue_enabled: true,
            exchange_api_url: None,
            settlement_api_url: None,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            collection_address: None,
            verifying_contract: Address::ZERO,
            db_path: "./boonlink.db".to_string(),
            probe_endpoints: vec![
                "https://bsc-dataseed.binance.org".to_string(),
                "https://api.binance.com/api/v3/ping".to_string(),
                "https://www.cloudflare.com/cdn-cgi/trace".to_string(),
            ],
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, BridgeError> {
        let mut config = Self::default();

        config.demo_mode = std::env::var("BOONLINK_DEMO_MODE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        if let Ok(token) = std::env::var("BOONLINK_DEFAULT_TOKEN") {
            config.default_token = Token::parse(&token)?;
        }

        if let Ok(max) = std::env::var("BOONLINK_MAX_AMOUNT_THB") {
            config.max_amount_thb = max
                .parse()
                .map_err(|_| BridgeError::Config(format!("bad BOONLINK_MAX_AMOUNT_THB: {max}")))?;
        }

        config.offline_queue_enabled = std::env::var("BOONLINK_OFFLINE_QUEUE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        config.exchange_api_url = std::env::var("BOONLINK_EXCHANGE_API_URL")
            .ok()
            .filter(|s| !s.is_empty());

        config.settlement_api_url = std::env::var("BOONLINK_SETTLEMENT_API_URL")
            .ok()
            .filter(|s| !s.is_empty());

        if let Ok(url) = std::env::var("BOONLINK_RPC_URL") {
            if !url.is_empty() {
                config.rpc_url = url;
            }
        }

        if let Ok(addr) = std::env::var("BOONLINK_COLLECTION_ADDRESS") {
            config.collection_address = Some(
                addr.parse()
                    .map_err(|_| BridgeError::Config(format!("bad collection address: {addr}")))?,
            );
        }

        if let Ok(addr) = std::env::var("BOONLINK_VERIFYING_CONTRACT") {
            config.verifying_contract = addr
                .parse()
                .map_err(|_| BridgeError::Config(format!("bad verifying contract: {addr}")))?;
        }

        if let Ok(path) = std::env::var("BOONLINK_DB_PATH") {
            if !path.is_empty() {
                config.db_path = path;
            }
        }

        if let Ok(endpoints) = std::env::var("BOONLINK_PROBE_ENDPOINTS") {
            let parsed: Vec<String> = endpoints
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.probe_endpoints = parsed;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.demo_mode);
        assert_eq!(config.max_amount_thb, dec!(10000));
        assert_eq!(config.probe_endpoints.len(), 3);
        assert_eq!(config.verifying_contract, Address::ZERO);
    }
}
