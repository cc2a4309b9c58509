//! End-to-end payment flows through the tool surface, on mock capabilities.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use rust_decimal_macros::dec;

use boonlink::mock::{MockBlockchain, MockSettlement};
use boonlink::order::PaymentStatus;
use boonlink::promptpay::{self, AccountType};
use boonlink::rates::RateService;
use boonlink::{BridgeConfig, BridgeContext, NetworkStatus, Token};
use boonlink_tools::{
    BridgeTools, CheckStatusRequest, ConfirmPaymentRequest, GetQuoteRequest, ScanQrRequest,
    ToolRegistry,
};

const WALLET: &str = "0x1111111111111111111111111111111111111111";

struct Harness {
    tools: BridgeTools,
    blockchain: Arc<MockBlockchain>,
    ctx: Arc<BridgeContext>,
}

fn harness() -> Harness {
    let mut config = BridgeConfig::default();
    config.db_path = ":memory:".to_string();

    let blockchain = Arc::new(MockBlockchain::new());
    let ctx = Arc::new(
        BridgeContext::new(
            config,
            blockchain.clone(),
            Arc::new(MockSettlement::new()),
            Arc::new(RateService::mock()),
        )
        .unwrap(),
    );
    Harness {
        tools: BridgeTools::new(Arc::clone(&ctx)),
        blockchain,
        ctx,
    }
}

async fn scan(tools: &BridgeTools, payload: &str) -> boonlink_tools::ScanQrResponse {
    tools
        .scan_promptpay_qr(ScanQrRequest {
            image_url: format!("mock://{payload}"),
        })
        .await
}

#[tokio::test]
async fn static_amount_phone_qr_happy_path() {
    let h = harness();

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let scanned = scan(&h.tools, &payload).await;
    assert!(scanned.success);
    assert!(scanned.warning.is_none());
    let data = scanned.data.unwrap();
    assert_eq!(data.account_id, "0812345678");
    assert_eq!(data.amount, Some(dec!(150.00)));

    let quoted = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(150),
            token: Token::Usdt,
            prompt_pay: data,
        })
        .await;
    assert!(quoted.success, "{:?}", quoted.error);
    let quote = quoted.quote.unwrap();

    // 150/35.50 principal + 5/35.50 network + 0.5% service.
    let expected = dec!(150) / dec!(35.50)
        + dec!(5) / dec!(35.50)
        + (dec!(150) / dec!(35.50)) * dec!(0.005);
    assert!((quote.amount_crypto - expected).abs() < dec!(0.0005));

    let confirmed = h
        .tools
        .confirm_payment(ConfirmPaymentRequest {
            quote_id: quote.id.clone(),
            wallet_address: WALLET.to_string(),
            user_id: "user-1".to_string(),
            chat_id: "chat-1".to_string(),
        })
        .await;

    assert!(confirmed.success, "{:?}", confirmed.error);
    assert_eq!(confirmed.status, Some(PaymentStatus::Completed));
    assert!(confirmed.tx_hash.is_some());
    let order = confirmed.order.unwrap();
    assert!(order.settlement_id.is_some());
    assert!(order.completed_at.is_some());

    // The quote was consumed.
    assert!(h.ctx.quotes.get(&quote.id).is_none());

    let status = h
        .tools
        .check_payment_status(CheckStatusRequest {
            order_id: order.id.clone(),
        })
        .await;
    assert!(status.success);
    assert_eq!(status.order.unwrap().status, PaymentStatus::Completed);
}

#[tokio::test]
async fn dynamic_national_id_qr_uses_caller_amount() {
    let h = harness();

    let payload = promptpay::generate("1234567890123", None).unwrap();
    let scanned = scan(&h.tools, &payload).await;
    assert!(scanned.success);
    let data = scanned.data.unwrap();
    assert_eq!(data.account_type, AccountType::NationalId);
    assert_eq!(data.account_id, "1234567890123");
    assert_eq!(data.amount, None);

    let quoted = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(500),
            token: Token::Usdc,
            prompt_pay: data,
        })
        .await;
    assert!(quoted.success);
    let quote = quoted.quote.unwrap();
    assert_eq!(quote.amount_thb, dec!(500));
    assert_eq!(quote.token, Token::Usdc);
}

#[tokio::test]
async fn expired_quote_is_refused() {
    let h = harness();

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let data = scan(&h.tools, &payload).await.data.unwrap();
    let quote = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(150),
            token: Token::Usdt,
            prompt_pay: data,
        })
        .await
        .quote
        .unwrap();

    // Age the stored quote past its window.
    let mut stale = quote.clone();
    stale.expires_at = Utc::now() - TimeDelta::milliseconds(1_000);
    h.ctx.quotes.insert(stale);

    let confirmed = h
        .tools
        .confirm_payment(ConfirmPaymentRequest {
            quote_id: quote.id.clone(),
            wallet_address: WALLET.to_string(),
            user_id: "user-1".to_string(),
            chat_id: "chat-1".to_string(),
        })
        .await;

    assert!(!confirmed.success);
    assert_eq!(confirmed.error.as_deref(), Some("Quote has expired"));
    assert!(confirmed.order_id.is_none(), "no order was created");
}

#[tokio::test]
async fn unknown_quote_is_refused() {
    let h = harness();
    let confirmed = h
        .tools
        .confirm_payment(ConfirmPaymentRequest {
            quote_id: "does-not-exist".to_string(),
            wallet_address: WALLET.to_string(),
            user_id: "user-1".to_string(),
            chat_id: "chat-1".to_string(),
        })
        .await;
    assert!(!confirmed.success);
    assert!(confirmed.error.unwrap().contains("Quote not found"));
}

#[tokio::test]
async fn insufficient_balance_fails_order_without_queueing() {
    let h = harness();

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let data = scan(&h.tools, &payload).await.data.unwrap();
    let quote = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(150),
            token: Token::Usdt,
            prompt_pay: data,
        })
        .await
        .quote
        .unwrap();

    // Wallet holds 1 USDT; the quote needs ~4.39.
    h.blockchain
        .set_balance(WALLET.parse().unwrap(), Token::Usdt, dec!(1));

    let confirmed = h
        .tools
        .confirm_payment(ConfirmPaymentRequest {
            quote_id: quote.id,
            wallet_address: WALLET.to_string(),
            user_id: "user-1".to_string(),
            chat_id: "chat-1".to_string(),
        })
        .await;

    assert!(!confirmed.success);
    assert!(confirmed.error.unwrap().contains("insufficient balance"));
    assert_eq!(confirmed.status, Some(PaymentStatus::Failed));

    let order = confirmed.order.unwrap();
    assert!(order.signature.is_none(), "nothing was signed");
    assert!(h.ctx.store.all_items().unwrap().is_empty(), "queue untouched");
}

#[tokio::test]
async fn offline_confirm_parks_payment_in_queue() {
    let h = harness();
    h.ctx.network.set_status(NetworkStatus::Offline);

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let data = scan(&h.tools, &payload).await.data.unwrap();
    let quote = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(150),
            token: Token::Usdt,
            prompt_pay: data,
        })
        .await
        .quote
        .unwrap();

    let confirmed = h
        .tools
        .confirm_payment(ConfirmPaymentRequest {
            quote_id: quote.id,
            wallet_address: WALLET.to_string(),
            user_id: "user-1".to_string(),
            chat_id: "chat-1".to_string(),
        })
        .await;

    // Signed and parked, not broadcast.
    assert!(confirmed.success);
    assert_eq!(confirmed.status, Some(PaymentStatus::Signed));
    assert!(confirmed.tx_hash.is_none());
    assert_eq!(h.ctx.store.all_items().unwrap().len(), 1);

    // Connectivity returns: a forced sync completes the payment.
    h.ctx.network.set_status(NetworkStatus::Online);
    let report = h.ctx.sync.force_sync().await.unwrap();
    assert_eq!(report.processed, 1);

    let order = h
        .ctx
        .store
        .get_order(confirmed.order_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(order.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn crc_tampered_qr_warns_and_is_not_quotable() {
    let h = harness();

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let mut chars: Vec<char> = payload.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == '0' { '1' } else { '0' };
    let tampered: String = chars.into_iter().collect();

    let scanned = scan(&h.tools, &tampered).await;
    assert!(scanned.success, "structural parse still succeeds");
    assert!(scanned.warning.is_some());
    let data = scanned.data.unwrap();
    assert!(!data.is_valid);

    let quoted = h
        .tools
        .get_crypto_quote(GetQuoteRequest {
            amount_thb: dec!(150),
            token: Token::Usdt,
            prompt_pay: data,
        })
        .await;
    assert!(!quoted.success);
    assert!(quoted.error.unwrap().contains("checksum"));
}

#[tokio::test]
async fn registry_dispatches_by_name() {
    let h = harness();
    let registry = ToolRegistry::new(h.tools);

    let rates = registry
        .execute("get_exchange_rates", serde_json::json!({}))
        .await;
    assert_eq!(rates["success"], true);
    assert_eq!(rates["rates"].as_array().unwrap().len(), 3);

    let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
    let scanned = registry
        .execute(
            "scan_promptpay_qr",
            serde_json::json!({ "imageUrl": format!("mock://{payload}") }),
        )
        .await;
    assert_eq!(scanned["success"], true);
    assert_eq!(scanned["data"]["accountId"], "0812345678");

    let unknown = registry
        .execute("mint_money", serde_json::json!({}))
        .await;
    assert_eq!(unknown["success"], false);

    let bad_args = registry
        .execute("check_payment_status", serde_json::json!({ "nope": 1 }))
        .await;
    assert_eq!(bad_args["success"], false);
}

#[tokio::test]
async fn sync_refuses_offline_and_overlap() {
    let h = harness();
    h.ctx.network.set_status(NetworkStatus::Offline);
    assert!(h.ctx.sync.force_sync().await.is_err());

    h.ctx.network.set_status(NetworkStatus::Online);
    assert!(h.ctx.sync.force_sync().await.is_ok());
}
