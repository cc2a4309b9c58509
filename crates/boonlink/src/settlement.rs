//! HTTP client for the fiat settlement gateway.
//!
//! The gateway moves THB to the merchant's PromptPay account once the
//! crypto leg has confirmed. Settlement is idempotent on the order id on
//! the gateway side; this client just reports what the gateway says.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::BridgeError;
use crate::order::PaymentOrder;
use crate::promptpay::AccountType;
use crate::services::{Settlement, SettlementReceipt};

const SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettleRequest<'a> {
    order_id: &'a str,
    account_id: &'a str,
    account_type: AccountType,
    #[serde(rename = "amountTHB")]
    amount_thb: Decimal,
    currency: &'static str,
}

/// Settlement capability backed by the gateway's REST API.
pub struct HttpSettlement {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSettlement {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(SETTLEMENT_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url,
        }
    }
}

#[async_trait]
impl Settlement for HttpSettlement {
    async fn settle(&self, order: &PaymentOrder) -> Result<SettlementReceipt, BridgeError> {
        let request = SettleRequest {
            order_id: &order.id,
            account_id: &order.quote.prompt_pay.account_id,
            account_type: order.quote.prompt_pay.account_type,
            amount_thb: order.quote.amount_thb,
            currency: "THB",
        };

        let receipt: SettlementReceipt = self
            .client
            .post(format!("{}/v1/settlements", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if receipt.success {
            tracing::info!(
                order = %order.id,
                settlement = receipt.settlement_id.as_deref().unwrap_or("?"),
                "settlement accepted"
            );
        } else {
            tracing::warn!(
                order = %order.id,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "settlement rejected"
            );
        }
        Ok(receipt)
    }

    async fn check_status(&self, settlement_id: &str) -> Result<SettlementReceipt, BridgeError> {
        let receipt: SettlementReceipt = self
            .client
            .get(format!("{}/v1/settlements/{settlement_id}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(receipt)
    }
}
