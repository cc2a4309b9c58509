//! The fixed tool surface.
//!
//! Every tool is a thin validated entrypoint over the bridge context. No
//! tool ever propagates an error out-of-band: validation and capability
//! failures all land in the `{success: false, error}` half of the response
//! shape, so a chat surface can always render something.

use std::sync::Arc;

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use boonlink::order::PaymentStatus;
use boonlink::promptpay;
use boonlink::quote::build_quote;
use boonlink::store::OfflineQueueItem;
use boonlink::{
    BridgeContext, ExchangeRate, PaymentOrder, PaymentQuote, PromptPayData, Token,
};

use crate::scan;

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanQrRequest {
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQuoteRequest {
    #[serde(rename = "amountTHB")]
    pub amount_thb: Decimal,
    pub token: Token,
    pub prompt_pay: PromptPayData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub quote_id: String,
    pub wallet_address: String,
    pub user_id: String,
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    pub order_id: String,
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanQrResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PromptPayData>,
    /// Set when the payload parsed but its CRC disagrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQuoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PaymentQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<PaymentOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<PaymentOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRatesResponse {
    pub success: bool,
    pub rates: Vec<ExchangeRate>,
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Tools ────────────────────────────────────────────────────────────────

/// The tool surface over one bridge context.
pub struct BridgeTools {
    ctx: Arc<BridgeContext>,
}

impl BridgeTools {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    /// `scan_promptpay_qr`: fetch an image, find the QR, parse the payload.
    pub async fn scan_promptpay_qr(&self, request: ScanQrRequest) -> ScanQrResponse {
        let payload = match scan::extract_payload(&request.image_url).await {
            Ok(payload) => payload,
            Err(error) => {
                return ScanQrResponse {
                    success: false,
                    data: None,
                    warning: None,
                    error: Some(error),
                }
            }
        };

        match promptpay::parse(&payload) {
            Ok(data) => {
                let warning = (!data.is_valid).then(|| {
                    "QR checksum mismatch: the code may be corrupted or tampered with".to_string()
                });
                if warning.is_some() {
                    tracing::warn!(account = %data.account_id, "scanned QR failed CRC check");
                }
                ScanQrResponse {
                    success: true,
                    data: Some(data),
                    warning,
                    error: None,
                }
            }
            Err(e) => ScanQrResponse {
                success: false,
                data: None,
                warning: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// `get_crypto_quote`: validate and issue a fee-inclusive quote.
    pub async fn get_crypto_quote(&self, request: GetQuoteRequest) -> GetQuoteResponse {
        // Policy, not mechanics: a QR that failed its CRC never reaches the
        // quote engine.
        if !request.prompt_pay.is_valid {
            return GetQuoteResponse {
                success: false,
                quote: None,
                error: Some("refusing to quote a QR that failed its checksum".to_string()),
            };
        }

        let rate = match self.ctx.rates.get_rate(request.token).await {
            Ok(rate) => rate,
            Err(e) => {
                return GetQuoteResponse {
                    success: false,
                    quote: None,
                    error: Some(e.to_string()),
                }
            }
        };

        match build_quote(
            request.amount_thb,
            request.token,
            rate,
            request.prompt_pay,
            self.ctx.config.max_amount_thb,
        ) {
            Ok(quote) => {
                self.ctx.quotes.evict_expired(Utc::now());
                self.ctx.quotes.insert(quote.clone());
                tracing::info!(
                    quote = %quote.id,
                    amount_thb = %quote.amount_thb,
                    token = %quote.token,
                    "quote issued"
                );
                GetQuoteResponse {
                    success: true,
                    quote: Some(quote),
                    error: None,
                }
            }
            Err(e) => GetQuoteResponse {
                success: false,
                quote: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// `confirm_payment`: consume a quote, check funds, sign, enqueue, and
    /// (online) drain straight through to completion.
    pub async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> ConfirmPaymentResponse {
        match self.confirm_inner(request).await {
            Ok(response) => response,
            Err(error) => ConfirmPaymentResponse {
                success: false,
                order_id: None,
                tx_hash: None,
                status: None,
                order: None,
                error: Some(error),
            },
        }
    }

    async fn confirm_inner(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<ConfirmPaymentResponse, String> {
        let quote = self
            .ctx
            .quotes
            .get(&request.quote_id)
            .ok_or_else(|| format!("Quote not found: {}", request.quote_id))?;

        if quote.is_expired(Utc::now()) {
            self.ctx.quotes.remove(&quote.id);
            return Err("Quote has expired".to_string());
        }

        let wallet: Address = request
            .wallet_address
            .parse()
            .map_err(|e| format!("bad wallet address: {e}"))?;

        let mut order = PaymentOrder::new(quote.clone(), &request.user_id, &request.chat_id);
        order
            .transition(PaymentStatus::Quoted)
            .map_err(|e| e.to_string())?;
        self.ctx.store.insert_order(&order).map_err(|e| e.to_string())?;

        // Funds check before anything is signed. An underfunded wallet
        // fails the order without ever touching the queue.
        let balance = self
            .ctx
            .blockchain
            .get_balance(wallet, quote.token)
            .await
            .map_err(|e| e.to_string())?;
        if balance < quote.amount_crypto {
            let reason = format!(
                "insufficient balance: have {balance}, need {}",
                quote.amount_crypto
            );
            order
                .fail(PaymentStatus::Failed, &reason)
                .map_err(|e| e.to_string())?;
            self.ctx.store.update_order(&order).map_err(|e| e.to_string())?;
            self.ctx.quotes.remove(&quote.id);
            return Ok(ConfirmPaymentResponse {
                success: false,
                order_id: Some(order.id.clone()),
                tx_hash: None,
                status: Some(order.status),
                order: Some(order),
                error: Some(reason),
            });
        }

        let collection = self.ctx.config.collection_address.unwrap_or(Address::ZERO);
        let tx = self
            .ctx
            .blockchain
            .create_transfer_tx(wallet, collection, quote.amount_crypto, quote.token)
            .await
            .map_err(|e| e.to_string())?;
        let signature = self
            .ctx
            .blockchain
            .sign_transaction(&tx)
            .await
            .map_err(|e| e.to_string())?;

        order
            .transition(PaymentStatus::Signed)
            .map_err(|e| e.to_string())?;
        order.signature = Some(signature.clone());
        self.ctx.store.update_order(&order).map_err(|e| e.to_string())?;
        self.ctx.quotes.remove(&quote.id);

        let item = OfflineQueueItem {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            signed_tx_blob: signature.signed_tx.clone(),
            retry_count: 0,
            last_retry: None,
            next_retry: None,
            created_at: Utc::now(),
        };
        self.ctx.store.enqueue(&item).map_err(|e| e.to_string())?;
        tracing::info!(order = %order.id, "signed transaction enqueued");

        // The online path drains synchronously; offline, the item waits for
        // the network detector to flip the processor back on.
        self.ctx
            .processor
            .on_enqueued()
            .await
            .map_err(|e| e.to_string())?;

        let order = self
            .ctx
            .store
            .get_order(&order.id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "order vanished during processing".to_string())?;

        Ok(ConfirmPaymentResponse {
            success: order.status != PaymentStatus::Failed,
            order_id: Some(order.id.clone()),
            tx_hash: order.tx_hash.clone(),
            status: Some(order.status),
            error: order.error.clone(),
            order: Some(order),
        })
    }

    /// `check_payment_status`: order lookup.
    pub async fn check_payment_status(&self, request: CheckStatusRequest) -> CheckStatusResponse {
        match self.ctx.store.get_order(&request.order_id) {
            Ok(Some(order)) => CheckStatusResponse {
                success: true,
                order: Some(order),
                error: None,
            },
            Ok(None) => CheckStatusResponse {
                success: false,
                order: None,
                error: Some(format!("order not found: {}", request.order_id)),
            },
            Err(e) => CheckStatusResponse {
                success: false,
                order: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// `get_exchange_rates`: per-token rate plus a display string.
    pub async fn get_exchange_rates(&self) -> ExchangeRatesResponse {
        match self.ctx.rates.all_rates().await {
            Ok(rates) => {
                let formatted = rates
                    .iter()
                    .map(|r| format!("1 {} = {} THB ({})", r.token, r.rate.round_dp(2), r.source))
                    .collect::<Vec<_>>()
                    .join("\n");
                ExchangeRatesResponse {
                    success: true,
                    rates,
                    formatted,
                    error: None,
                }
            }
            Err(e) => ExchangeRatesResponse {
                success: false,
                rates: vec![],
                formatted: String::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
