//! Tool declarations and the JSON dispatcher.
//!
//! The chat surface registers these declarations with its AI runtime and
//! routes calls back through [`ToolRegistry::execute`]. Names and payload
//! shapes are fixed for external callers; argument parsing failures come
//! back as `{success: false, error}` like every other tool failure.

use serde::Serialize;
use serde_json::json;

use crate::tools::{
    BridgeTools, CheckStatusRequest, ConfirmPaymentRequest, GetQuoteRequest, ScanQrRequest,
};

/// One registerable tool: a name, a blurb, and a JSON Schema for its
/// parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Declarations for every bridge tool, in registration order.
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: "scan_promptpay_qr".to_string(),
            description: "Scan a PromptPay QR code from an image URL and extract the merchant account, amount, and validity.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "imageUrl": {
                        "type": "string",
                        "description": "Absolute URL of the QR image (or mock://<payload> for a pre-built payload)"
                    }
                },
                "required": ["imageUrl"]
            }),
        },
        ToolDeclaration {
            name: "get_crypto_quote".to_string(),
            description: "Quote a THB amount in crypto, fees included. Quotes expire after 3 minutes.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "amountTHB": {
                        "type": "number",
                        "description": "Amount to pay, in THB"
                    },
                    "token": {
                        "type": "string",
                        "enum": ["USDT", "USDC", "ETH"],
                        "description": "Settlement token"
                    },
                    "promptPay": {
                        "type": "object",
                        "description": "Parsed PromptPay data from scan_promptpay_qr"
                    }
                },
                "required": ["amountTHB", "token", "promptPay"]
            }),
        },
        ToolDeclaration {
            name: "confirm_payment".to_string(),
            description: "Confirm a quoted payment: checks the wallet balance, signs the transfer, and broadcasts it (or queues it while offline).".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "quoteId": { "type": "string" },
                    "walletAddress": { "type": "string" },
                    "userId": { "type": "string" },
                    "chatId": { "type": "string" }
                },
                "required": ["quoteId", "walletAddress", "userId", "chatId"]
            }),
        },
        ToolDeclaration {
            name: "check_payment_status".to_string(),
            description: "Look up a payment order by id.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "orderId": { "type": "string" }
                },
                "required": ["orderId"]
            }),
        },
        ToolDeclaration {
            name: "get_exchange_rates".to_string(),
            description: "Current THB exchange rates for every supported token.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}

/// Dispatches named tool calls with JSON arguments.
pub struct ToolRegistry {
    tools: BridgeTools,
}

impl ToolRegistry {
    pub fn new(tools: BridgeTools) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &BridgeTools {
        &self.tools
    }

    /// Execute a tool by name. Unknown names and malformed arguments are
    /// reported in-band.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> serde_json::Value {
        match name {
            "scan_promptpay_qr" => match serde_json::from_value::<ScanQrRequest>(args) {
                Ok(request) => to_value(self.tools.scan_promptpay_qr(request).await),
                Err(e) => failure(e),
            },
            "get_crypto_quote" => match serde_json::from_value::<GetQuoteRequest>(args) {
                Ok(request) => to_value(self.tools.get_crypto_quote(request).await),
                Err(e) => failure(e),
            },
            "confirm_payment" => match serde_json::from_value::<ConfirmPaymentRequest>(args) {
                Ok(request) => to_value(self.tools.confirm_payment(request).await),
                Err(e) => failure(e),
            },
            "check_payment_status" => match serde_json::from_value::<CheckStatusRequest>(args) {
                Ok(request) => to_value(self.tools.check_payment_status(request).await),
                Err(e) => failure(e),
            },
            "get_exchange_rates" => to_value(self.tools.get_exchange_rates().await),
            other => json!({
                "success": false,
                "error": format!("unknown tool: {other}")
            }),
        }
    }
}

fn to_value<T: Serialize>(response: T) -> serde_json::Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        json!({
            "success": false,
            "error": format!("response serialization failed: {e}")
        })
    })
}

fn failure(e: serde_json::Error) -> serde_json::Value {
    json!({
        "success": false,
        "error": format!("invalid arguments: {e}")
    })
}
