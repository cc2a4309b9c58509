//! BoonLink: a PromptPay-to-crypto payment bridge.
//!
//! Converts Thai PromptPay QR presentments into off-chain crypto
//! settlements: parse the QR, issue a time-bounded quote, sign a BEP-20
//! transfer (online or for later), broadcast and confirm it, then trigger a
//! THB settlement to the merchant's PromptPay account.
//!
//! # Pieces
//!
//! - [`promptpay`] — EMVCo TLV codec with CRC-16/CCITT-FALSE integrity
//! - [`eip712`] — typed-data offline authorizations and their QR envelope
//! - [`rates`] / [`quote`] — rate retrieval with fallback, fee-inclusive quotes
//! - [`order`] / [`store`] — the payment lifecycle, durable in SQLite
//! - [`processor`] — at-least-once broadcast/settle pipeline with backoff
//! - [`network`] — ONLINE/WEAK/OFFLINE probing that gates the queue
//! - [`sync`] — forced drains and storage hygiene
//! - [`services`] — the capability seams ([`mock`], [`chain`], [`settlement`])
//!
//! # Quick example (demo mode)
//!
//! ```no_run
//! use boonlink::{BridgeConfig, BridgeContext};
//!
//! # fn main() -> Result<(), boonlink::BridgeError> {
//! let ctx = BridgeContext::demo(BridgeConfig::default())?;
//! ctx.start()?;
//! let payload = boonlink::promptpay::generate("0812345678", None)?;
//! let parsed = boonlink::promptpay::parse(&payload)?;
//! assert!(parsed.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod context;
pub mod eip712;
pub mod error;
pub mod mock;
pub mod network;
pub mod order;
pub mod processor;
pub mod promptpay;
pub mod quote;
pub mod rates;
pub mod services;
pub mod settlement;
pub mod store;
pub mod sync;
pub mod token;

use alloy::sol;

// EIP-712 struct for offline payment authorizations.
// The sol! macro derives SolStruct, which provides eip712_signing_hash().
sol! {
    #[derive(Debug)]
    struct Payment {
        string orderId;
        string token;
        uint256 amount;
        address recipient;
        uint256 nonce;
        uint256 deadline;
    }
}

// BEP-20 (ERC-20 compatible) interface for on-chain token operations.
sol! {
    #[sol(rpc)]
    interface BEP20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 value) external returns (bool);
    }
}

// Re-exports
pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use error::BridgeError;
pub use network::{NetworkChange, NetworkDetector, NetworkStatus};
pub use order::{PaymentOrder, PaymentStatus, TransactionSignature};
pub use processor::QueueProcessor;
pub use promptpay::{AccountType, PromptPayData};
pub use quote::{FeeBreakdown, PaymentQuote, QuoteIndex};
pub use rates::{ExchangeRate, RateService, RateSource};
pub use services::{Blockchain, Settlement, SettlementReceipt, TxRequest};
pub use store::{BridgeStore, OfflineQueueItem, QueueStats};
pub use sync::{SyncCoordinator, SyncEvent, SyncReport};
pub use token::Token;
