use alloy::primitives::{address, Address};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Settlement tokens accepted by the bridge. All are BEP-20 assets on BSC
/// except ETH, which is bridged Binance-peg ETH (also BEP-20 there).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    #[serde(rename = "USDT")]
    Usdt,
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "ETH")]
    Eth,
}

impl Token {
    pub const ALL: [Token; 3] = [Token::Usdt, Token::Usdc, Token::Eth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Usdt => "USDT",
            Token::Usdc => "USDC",
            Token::Eth => "ETH",
        }
    }

    pub fn parse(s: &str) -> Result<Self, BridgeError> {
        match s.to_ascii_uppercase().as_str() {
            "USDT" => Ok(Token::Usdt),
            "USDC" => Ok(Token::Usdc),
            "ETH" => Ok(Token::Eth),
            other => Err(BridgeError::Config(format!("unsupported token: {other}"))),
        }
    }

    /// BEP-20 contract address on BSC mainnet.
    pub fn contract_address(&self) -> Address {
        match self {
            Token::Usdt => address!("55d398326f99059fF775485246999027B3197955"),
            Token::Usdc => address!("8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
            Token::Eth => address!("2170Ed0880ac9A755fd29B2688956BD959F933F8"),
        }
    }

    /// All three are 18-decimal BEP-20 deployments on BSC.
    pub fn decimals(&self) -> u32 {
        18
    }

    /// Flat network fee charged per transfer, denominated in THB.
    pub fn network_fee_thb(&self) -> Decimal {
        match self {
            Token::Usdt | Token::Usdc => dec!(5),
            Token::Eth => dec!(15),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Token::parse("usdt").unwrap(), Token::Usdt);
        assert_eq!(Token::parse("Eth").unwrap(), Token::Eth);
        assert!(Token::parse("DOGE").is_err());
    }

    #[test]
    fn test_network_fee_table() {
        assert_eq!(Token::Usdt.network_fee_thb(), dec!(5));
        assert_eq!(Token::Usdc.network_fee_thb(), dec!(5));
        assert_eq!(Token::Eth.network_fee_thb(), dec!(15));
    }

    #[test]
    fn test_serde_uses_ticker_symbols() {
        assert_eq!(serde_json::to_string(&Token::Usdt).unwrap(), r#""USDT""#);
        let t: Token = serde_json::from_str(r#""ETH""#).unwrap();
        assert_eq!(t, Token::Eth);
    }
}
