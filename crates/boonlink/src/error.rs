use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by bridge operations.
///
/// A CRC mismatch on a scanned QR is deliberately not represented here: the
/// codec records it in [`crate::promptpay::PromptPayData::is_valid`] and the
/// tool layer decides what to do with it.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid QR format: {0}")]
    InvalidFormat(String),

    #[error("not a PromptPay QR")]
    NotPromptPay,

    #[error("invalid PromptPay account id: {0}")]
    InvalidAccountId(String),

    #[error("quote has expired")]
    QuoteExpired,

    #[error("quote not found: {0}")]
    QuoteNotFound(String),

    #[error("amount out of range: {amount} THB (max {max})")]
    AmountOutOfRange { amount: Decimal, max: Decimal },

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("transaction not confirmed within {0} seconds")]
    ConfirmationTimeout(u64),

    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("authorization deadline has passed")]
    SignatureExpired,

    #[error("network is offline")]
    NetworkOffline,

    #[error("sync already in progress")]
    SyncInProgress,

    #[error("illegal order transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
