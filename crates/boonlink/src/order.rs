//! Payment orders and the lifecycle state machine.
//!
//! Transitions are pure and synchronous; persistence lives in
//! [`crate::store`]. The graph:
//!
//! ```text
//! INIT      -> QUOTED | CANCELLED
//! QUOTED    -> SIGNED | EXPIRED | CANCELLED | FAILED
//! SIGNED    -> PENDING | FAILED
//! PENDING   -> SETTLED | FAILED | TIMEOUT
//! SETTLED   -> COMPLETED | FAILED
//! COMPLETED | EXPIRED | CANCELLED | FAILED | TIMEOUT -> (terminal)
//! ```

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::quote::PaymentQuote;

/// Payment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Init,
    Quoted,
    Signed,
    Pending,
    Settled,
    Completed,
    Expired,
    Cancelled,
    Failed,
    Timeout,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 10] = [
        PaymentStatus::Init,
        PaymentStatus::Quoted,
        PaymentStatus::Signed,
        PaymentStatus::Pending,
        PaymentStatus::Settled,
        PaymentStatus::Completed,
        PaymentStatus::Expired,
        PaymentStatus::Cancelled,
        PaymentStatus::Failed,
        PaymentStatus::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Init => "INIT",
            PaymentStatus::Quoted => "QUOTED",
            PaymentStatus::Signed => "SIGNED",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Settled => "SETTLED",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn parse(s: &str) -> Result<Self, BridgeError> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BridgeError::Config(format!("unknown payment status: {s}")))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Expired
                | PaymentStatus::Cancelled
                | PaymentStatus::Failed
                | PaymentStatus::Timeout
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Init, Quoted | Cancelled)
                | (Quoted, Signed | Expired | Cancelled | Failed)
                | (Signed, Pending | Failed)
                | (Pending, Settled | Failed | Timeout)
                | (Settled, Completed | Failed)
        )
    }

    /// A user cancel is only legal before anything has been signed.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Init | PaymentStatus::Quoted)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-transaction envelope the blockchain capability hands back.
/// Opaque to the bridge beyond these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    /// Raw signed transaction, 0x-prefixed hex.
    pub signed_tx: String,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Wei, as a decimal string to keep the envelope JSON-portable.
    pub gas_price: String,
    pub chain_id: u64,
    pub signed_at: DateTime<Utc>,
}

/// Mutable envelope around a quote as it moves through the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    pub status: PaymentStatus,
    pub quote: PaymentQuote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<TransactionSignature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentOrder {
    /// Create a fresh order around a consumed quote.
    pub fn new(quote: PaymentQuote, user_id: &str, chat_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            status: PaymentStatus::Init,
            quote,
            signature: None,
            tx_hash: None,
            settlement_id: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Advance to `next`, refusing illegal moves. `updated_at` is bumped on
    /// success; `completed_at` is stamped iff the order completes.
    pub fn transition(&mut self, next: PaymentStatus) -> Result<(), BridgeError> {
        if !self.status.can_transition_to(next) {
            return Err(BridgeError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == PaymentStatus::Completed {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Record a failure reason alongside a transition to a failure state.
    pub fn fail(&mut self, state: PaymentStatus, reason: &str) -> Result<(), BridgeError> {
        debug_assert!(matches!(
            state,
            PaymentStatus::Failed | PaymentStatus::Timeout | PaymentStatus::Expired
        ));
        self.transition(state)?;
        self.error = Some(reason.to_string());
        Ok(())
    }
}
