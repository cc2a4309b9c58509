//! Mock capability implementations for demo mode and tests.
//!
//! The mock chain signs with a throwaway key and derives transaction
//! hashes from the signed blob, so re-broadcasts are naturally idempotent.
//! The mock settlement gateway replays identical receipts for duplicate
//! order ids inside a 24-hour window, matching the contract the real
//! gateway advertises.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::config::BSC_CHAIN_ID;
use crate::error::BridgeError;
use crate::order::{PaymentOrder, TransactionSignature};
use crate::services::{to_base_units, Blockchain, Settlement, SettlementReceipt, TxRequest};
use crate::token::Token;

/// In-memory blockchain stand-in.
pub struct MockBlockchain {
    signer: PrivateKeySigner,
    balances: DashMap<(Address, Token), Decimal>,
    default_balance: Decimal,
    /// signed blob -> tx hash, so a replayed broadcast returns the same
    /// hash instead of a double-spend.
    broadcasts: DashMap<String, String>,
    nonce: AtomicU64,
    broadcast_calls: AtomicUsize,
    /// Remaining broadcasts that will fail. Tests arm this.
    broadcast_failures: AtomicUsize,
    /// Remaining confirmations that will time out. Tests arm this.
    confirmation_failures: AtomicUsize,
}

impl MockBlockchain {
    pub fn new() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
            balances: DashMap::new(),
            default_balance: dec!(1000),
            broadcasts: DashMap::new(),
            nonce: AtomicU64::new(1),
            broadcast_calls: AtomicUsize::new(0),
            broadcast_failures: AtomicUsize::new(0),
            confirmation_failures: AtomicUsize::new(0),
        }
    }

    /// Pin a balance for one (address, token) pair.
    pub fn set_balance(&self, address: Address, token: Token, balance: Decimal) {
        self.balances.insert((address, token), balance);
    }

    /// Make the next `n` broadcasts fail.
    pub fn fail_broadcasts(&self, n: usize) {
        self.broadcast_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` confirmation waits time out.
    pub fn fail_confirmations(&self, n: usize) {
        self.confirmation_failures.store(n, Ordering::SeqCst);
    }

    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockBlockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Blockchain for MockBlockchain {
    async fn get_balance(&self, address: Address, token: Token) -> Result<Decimal, BridgeError> {
        Ok(self
            .balances
            .get(&(address, token))
            .map(|b| *b)
            .unwrap_or(self.default_balance))
    }

    async fn create_transfer_tx(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        token: Token,
    ) -> Result<TxRequest, BridgeError> {
        Ok(TxRequest {
            from,
            to,
            token,
            amount: to_base_units(amount, token.decimals())?,
            nonce: self.nonce.fetch_add(1, Ordering::SeqCst),
            gas_limit: 60_000,
            gas_price: 3_000_000_000, // 3 gwei
            chain_id: BSC_CHAIN_ID,
        })
    }

    async fn sign_transaction(
        &self,
        tx: &TxRequest,
    ) -> Result<TransactionSignature, BridgeError> {
        let digest = keccak256(serde_json::to_vec(tx)?);
        let sig = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|e| BridgeError::SignatureInvalid(format!("mock signing failed: {e}")))?;

        let mut blob = digest.to_vec();
        blob.extend_from_slice(&sig.as_bytes());

        Ok(TransactionSignature {
            signed_tx: format!("0x{}", hex::encode(blob)),
            from: tx.from,
            to: tx.to,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price.to_string(),
            chain_id: tx.chain_id,
            signed_at: Utc::now(),
        })
    }

    async fn broadcast_transaction(&self, signed_tx: &str) -> Result<String, BridgeError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(existing) = self.broadcasts.get(signed_tx) {
            // Already in the mempool: success, same hash.
            return Ok(existing.clone());
        }

        if Self::take_failure(&self.broadcast_failures) {
            return Err(BridgeError::BroadcastFailed("rpc unavailable".to_string()));
        }

        let hash = format!("0x{}", hex::encode(keccak256(signed_tx.as_bytes())));
        self.broadcasts
            .insert(signed_tx.to_string(), hash.clone());
        Ok(hash)
    }

    async fn wait_for_confirmation(
        &self,
        _tx_hash: &str,
        _confirmations: u64,
        _timeout: Duration,
    ) -> Result<bool, BridgeError> {
        Ok(!Self::take_failure(&self.confirmation_failures))
    }
}

struct StoredReceipt {
    receipt: SettlementReceipt,
    settled_at: chrono::DateTime<Utc>,
}

/// In-memory settlement gateway stand-in.
pub struct MockSettlement {
    receipts: DashMap<String, StoredReceipt>,
    replay_window: TimeDelta,
    settle_calls: AtomicUsize,
    /// Remaining settles that will be rejected. Tests arm this.
    settle_failures: AtomicUsize,
}

impl MockSettlement {
    pub fn new() -> Self {
        Self {
            receipts: DashMap::new(),
            replay_window: TimeDelta::hours(24),
            settle_calls: AtomicUsize::new(0),
            settle_failures: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` settlement attempts fail.
    pub fn fail_settlements(&self, n: usize) {
        self.settle_failures.store(n, Ordering::SeqCst);
    }

    pub fn settle_calls(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSettlement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Settlement for MockSettlement {
    async fn settle(&self, order: &PaymentOrder) -> Result<SettlementReceipt, BridgeError> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();

        if let Some(stored) = self.receipts.get(&order.id) {
            if now - stored.settled_at < self.replay_window {
                return Ok(stored.receipt.clone());
            }
        }

        if MockBlockchain::take_failure(&self.settle_failures) {
            return Ok(SettlementReceipt {
                success: false,
                settlement_id: None,
                transaction_ref: None,
                timestamp: Some(now),
                error: Some("gateway rejected transfer".to_string()),
            });
        }

        let receipt = SettlementReceipt {
            success: true,
            settlement_id: Some(format!("stl-{}", Uuid::new_v4())),
            transaction_ref: Some(format!("ref-{}", &order.id[..8.min(order.id.len())])),
            timestamp: Some(now),
            error: None,
        };
        self.receipts.insert(
            order.id.clone(),
            StoredReceipt {
                receipt: receipt.clone(),
                settled_at: now,
            },
        );
        Ok(receipt)
    }

    async fn check_status(&self, settlement_id: &str) -> Result<SettlementReceipt, BridgeError> {
        self.receipts
            .iter()
            .find(|entry| {
                entry.receipt.settlement_id.as_deref() == Some(settlement_id)
            })
            .map(|entry| entry.receipt.clone())
            .ok_or_else(|| {
                BridgeError::SettlementFailed(format!("unknown settlement {settlement_id}"))
            })
    }
}
