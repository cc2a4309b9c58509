//! Tool surface for the BoonLink payment bridge.
//!
//! Five tools, fixed names and payloads, each a validated entrypoint over a
//! [`boonlink::BridgeContext`]:
//!
//! - `scan_promptpay_qr` — image URL in, parsed PromptPay data out
//! - `get_crypto_quote` — THB amount in, fee-inclusive 3-minute quote out
//! - `confirm_payment` — quote id + wallet in, signed/broadcast payment out
//! - `check_payment_status` — order lookup
//! - `get_exchange_rates` — per-token THB rates with a display string
//!
//! [`registry::declarations`] exposes the JSON Schemas a chat runtime needs
//! to register the tools; [`registry::ToolRegistry::execute`] dispatches.

pub mod registry;
pub mod scan;
pub mod tools;

pub use registry::{declarations, ToolDeclaration, ToolRegistry};
pub use tools::{
    BridgeTools, CheckStatusRequest, CheckStatusResponse, ConfirmPaymentRequest,
    ConfirmPaymentResponse, ExchangeRatesResponse, GetQuoteRequest, GetQuoteResponse,
    ScanQrRequest, ScanQrResponse,
};
