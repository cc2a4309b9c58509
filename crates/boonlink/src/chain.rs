//! BSC blockchain capability backed by an alloy provider.
//!
//! Transfers move BEP-20 tokens via the standard `transfer` call. Signing
//! and broadcast are split so a signed transaction can sit in the offline
//! queue between the two steps. Every RPC interaction carries an explicit
//! timeout.

use std::time::Duration;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::BSC_CHAIN_ID;
use crate::error::BridgeError;
use crate::order::TransactionSignature;
use crate::services::{from_base_units, to_base_units, Blockchain, TxRequest};
use crate::token::Token;
use crate::BEP20;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_GAS_LIMIT: u64 = 100_000;

/// The production chain capability.
pub struct BscChain<P> {
    provider: P,
    wallet: EthereumWallet,
}

impl<P> BscChain<P> {
    pub fn new(provider: P, signer: PrivateKeySigner) -> Self {
        Self {
            provider,
            wallet: EthereumWallet::from(signer),
        }
    }
}

#[async_trait]
impl<P> Blockchain for BscChain<P>
where
    P: Provider + Send + Sync,
{
    async fn get_balance(&self, address: Address, token: Token) -> Result<Decimal, BridgeError> {
        let contract = BEP20::new(token.contract_address(), &self.provider);
        let balance: U256 = tokio::time::timeout(RPC_TIMEOUT, contract.balanceOf(address).call())
            .await
            .map_err(|_| BridgeError::Chain("balanceOf timed out".to_string()))?
            .map_err(|e| BridgeError::Chain(format!("balanceOf failed: {e}")))?;
        from_base_units(balance, token.decimals())
    }

    async fn create_transfer_tx(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        token: Token,
    ) -> Result<TxRequest, BridgeError> {
        let nonce = tokio::time::timeout(RPC_TIMEOUT, self.provider.get_transaction_count(from))
            .await
            .map_err(|_| BridgeError::Chain("nonce fetch timed out".to_string()))?
            .map_err(|e| BridgeError::Chain(format!("nonce fetch failed: {e}")))?;
        let gas_price = tokio::time::timeout(RPC_TIMEOUT, self.provider.get_gas_price())
            .await
            .map_err(|_| BridgeError::Chain("gas price fetch timed out".to_string()))?
            .map_err(|e| BridgeError::Chain(format!("gas price fetch failed: {e}")))?;

        Ok(TxRequest {
            from,
            to,
            token,
            amount: to_base_units(amount, token.decimals())?,
            nonce,
            gas_limit: TRANSFER_GAS_LIMIT,
            gas_price,
            chain_id: BSC_CHAIN_ID,
        })
    }

    async fn sign_transaction(
        &self,
        tx: &TxRequest,
    ) -> Result<TransactionSignature, BridgeError> {
        let calldata = BEP20::transferCall {
            to: tx.to,
            value: tx.amount,
        }
        .abi_encode();

        let request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.token.contract_address())
            .with_nonce(tx.nonce)
            .with_chain_id(tx.chain_id)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(tx.gas_price)
            .with_input(calldata);

        let envelope = request
            .build(&self.wallet)
            .await
            .map_err(|e| BridgeError::Chain(format!("transaction signing failed: {e}")))?;

        Ok(TransactionSignature {
            signed_tx: format!("0x{}", hex::encode(envelope.encoded_2718())),
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
        let raw = hex::decode(signed_tx.strip_prefix("0x").unwrap_or(signed_tx))
            .map_err(|e| BridgeError::BroadcastFailed(format!("signed tx is not hex: {e}")))?;

        let result =
            tokio::time::timeout(RPC_TIMEOUT, self.provider.send_raw_transaction(&raw)).await;

        match result {
            Ok(Ok(pending)) => Ok(format!("{}", pending.tx_hash())),
            Ok(Err(e)) => {
                // Nodes reject a transaction they already hold; the intent
                // has landed, so the caller must treat it as delivered.
                let message = e.to_string();
                if message.contains("already known")
                    || message.contains("ALREADY_EXISTS")
                    || message.contains("nonce too low")
                {
                    let hash = TxHash::from(alloy::primitives::keccak256(&raw));
                    tracing::info!(tx = %hash, "broadcast of known transaction treated as success");
                    return Ok(format!("{hash}"));
                }
                Err(BridgeError::BroadcastFailed(message))
            }
            Err(_) => Err(BridgeError::BroadcastFailed(
                "send_raw_transaction timed out".to_string(),
            )),
        }
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<bool, BridgeError> {
        let hash: TxHash = tx_hash
            .parse()
            .map_err(|e| BridgeError::Chain(format!("bad tx hash {tx_hash}: {e}")))?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Ok(Some(receipt)) = self.provider.get_transaction_receipt(hash).await {
                if !receipt.status() {
                    return Err(BridgeError::Chain(format!("transaction {tx_hash} reverted")));
                }
                if let Some(mined_in) = receipt.block_number {
                    let latest = self
                        .provider
                        .get_block_number()
                        .await
                        .map_err(|e| BridgeError::Chain(format!("block number failed: {e}")))?;
                    if latest.saturating_sub(mined_in) + 1 >= confirmations {
                        return Ok(true);
                    }
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    }
}
