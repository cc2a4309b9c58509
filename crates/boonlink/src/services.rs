//! Capability boundaries the core orchestrates but does not implement.
//!
//! Each external collaborator — the chain, the fiat settlement gateway —
//! is a narrow trait. The context holds one `Arc<dyn …>` per capability;
//! demo mode and tests plug in the mocks from [`crate::mock`], production
//! plugs in [`crate::chain::BscChain`] and
//! [`crate::settlement::HttpSettlement`].

use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::order::{PaymentOrder, TransactionSignature};
use crate::token::Token;

/// An unsigned transfer, ready for signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub from: Address,
    /// Final recipient of the tokens (the collection address), not the
    /// token contract.
    pub to: Address,
    pub token: Token,
    /// Integer base units.
    pub amount: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Wei.
    pub gas_price: u128,
    pub chain_id: u64,
}

/// Convert a decimal token amount to integer base units, truncating excess
/// precision.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256, BridgeError> {
    let scaled = amount * Decimal::from(10u64.pow(decimals.min(18)));
    let truncated = scaled.trunc();
    let units = truncated
        .to_u128()
        .ok_or_else(|| BridgeError::Chain(format!("amount {amount} out of base-unit range")))?;
    Ok(U256::from(units))
}

/// Convert integer base units back to a decimal token amount.
pub fn from_base_units(units: U256, decimals: u32) -> Result<Decimal, BridgeError> {
    let raw: u128 = units
        .try_into()
        .map_err(|_| BridgeError::Chain(format!("balance {units} out of decimal range")))?;
    Decimal::try_from_i128_with_scale(raw as i128, decimals.min(28))
        .map_err(|e| BridgeError::Chain(format!("balance conversion failed: {e}")))
}

/// The on-chain leg.
#[async_trait]
pub trait Blockchain: Send + Sync {
    async fn get_balance(&self, address: Address, token: Token) -> Result<Decimal, BridgeError>;

    async fn create_transfer_tx(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        token: Token,
    ) -> Result<TxRequest, BridgeError>;

    async fn sign_transaction(
        &self,
        tx: &TxRequest,
    ) -> Result<TransactionSignature, BridgeError>;

    /// Broadcast a signed transaction. Re-broadcasting an already-known
    /// blob must succeed and return the same hash.
    async fn broadcast_transaction(&self, signed_tx: &str) -> Result<String, BridgeError>;

    /// Wait until the transaction has `confirmations` confirmations or the
    /// timeout elapses. `Ok(false)` means not confirmed in time.
    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<bool, BridgeError>;
}

/// Result of a settlement attempt or status check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The fiat leg: a THB transfer to the merchant's PromptPay account.
#[async_trait]
pub trait Settlement: Send + Sync {
    /// Settle an order. Must be idempotent on the order id: a duplicate
    /// call within the provider's replay window returns the same
    /// settlement id.
    async fn settle(&self, order: &PaymentOrder) -> Result<SettlementReceipt, BridgeError>;

    async fn check_status(&self, settlement_id: &str) -> Result<SettlementReceipt, BridgeError>;
}
