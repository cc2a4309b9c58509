//! Quote construction and the short-lived quote index.
//!
//! A quote is an immutable, fee-inclusive, time-bounded commitment: this
//! many THB buys this much crypto at this recorded rate, valid for three
//! minutes. Quotes live in an in-memory index separate from the order
//! store so expired ones can be evicted without touching order history.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QUOTE_TTL_MS;
use crate::error::BridgeError;
use crate::promptpay::PromptPayData;
use crate::rates::ExchangeRate;
use crate::token::Token;

/// Service fee as a fraction of the converted amount.
pub const SERVICE_FEE_RATE: Decimal = dec!(0.005);

/// Fee breakdown, denominated in the quote's token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub network: Decimal,
    pub service: Decimal,
    pub total: Decimal,
}

/// An issued quote. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuote {
    pub id: String,
    #[serde(rename = "amountTHB")]
    pub amount_thb: Decimal,
    pub amount_crypto: Decimal,
    pub token: Token,
    pub rate: ExchangeRate,
    pub fee: FeeBreakdown,
    pub prompt_pay: PromptPayData,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Build a quote from a THB amount and a fetched rate.
///
/// Fee model: a flat THB network fee converted at the quoted rate, plus a
/// 0.5% service fee on the converted principal. The crypto due is the
/// converted principal plus both fees.
pub fn build_quote(
    amount_thb: Decimal,
    token: Token,
    rate: ExchangeRate,
    prompt_pay: PromptPayData,
    max_amount_thb: Decimal,
) -> Result<PaymentQuote, BridgeError> {
    if amount_thb <= Decimal::ZERO || amount_thb > max_amount_thb {
        return Err(BridgeError::AmountOutOfRange {
            amount: amount_thb,
            max: max_amount_thb,
        });
    }
    if prompt_pay.account_id.is_empty() {
        return Err(BridgeError::InvalidAccountId("empty account id".to_string()));
    }
    debug_assert!(rate.rate > Decimal::ZERO);

    let principal = amount_thb / rate.rate;
    let network = token.network_fee_thb() / rate.rate;
    let service = principal * SERVICE_FEE_RATE;
    let total = network + service;

    let created_at = Utc::now();
    Ok(PaymentQuote {
        id: Uuid::new_v4().to_string(),
        amount_thb,
        amount_crypto: principal + total,
        token,
        rate,
        fee: FeeBreakdown {
            network,
            service,
            total,
        },
        prompt_pay,
        created_at,
        expires_at: created_at + TimeDelta::milliseconds(QUOTE_TTL_MS),
    })
}

/// In-memory index of live quotes, keyed by quote id.
pub struct QuoteIndex {
    quotes: DashMap<String, PaymentQuote>,
}

impl QuoteIndex {
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    pub fn insert(&self, quote: PaymentQuote) {
        self.quotes.insert(quote.id.clone(), quote);
    }

    pub fn get(&self, id: &str) -> Option<PaymentQuote> {
        self.quotes.get(id).map(|q| q.clone())
    }

    /// Remove a quote once it has been consumed by a confirm.
    pub fn remove(&self, id: &str) -> Option<PaymentQuote> {
        self.quotes.remove(id).map(|(_, q)| q)
    }

    /// Evict everything past its expiry. Returns the number evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.quotes.len();
        self.quotes.retain(|_, q| !q.is_expired(now));
        before - self.quotes.len()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl Default for QuoteIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promptpay;
    use crate::rates::MockRateSource;

    fn thb_rate(token: Token, rate: Decimal) -> ExchangeRate {
        let now = Utc::now();
        ExchangeRate {
            token,
            fiat: "THB".to_string(),
            rate,
            source: "mock".to_string(),
            timestamp: now,
            valid_until: now + TimeDelta::milliseconds(300_000),
        }
    }

    fn sample_promptpay() -> PromptPayData {
        let payload = promptpay::generate("0812345678", Some(dec!(150))).unwrap();
        promptpay::parse(&payload).unwrap()
    }

    #[test]
    fn test_fee_arithmetic_150_thb_at_35_50() {
        // 150 THB at 35.50: principal 4.2254, network 5/35.50, service 0.5%.
        let quote = build_quote(
            dec!(150),
            Token::Usdt,
            thb_rate(Token::Usdt, dec!(35.50)),
            sample_promptpay(),
            dec!(10000),
        )
        .unwrap();

        let expected = dec!(150) / dec!(35.50)
            + dec!(5) / dec!(35.50)
            + (dec!(150) / dec!(35.50)) * dec!(0.005);
        assert!((quote.amount_crypto - expected).abs() < dec!(0.0005));
        assert!((quote.amount_crypto - dec!(4.3873)).abs() < dec!(0.0005));
    }

    #[test]
    fn test_fee_total_is_sum_of_parts() {
        let quote = build_quote(
            dec!(500),
            Token::Eth,
            thb_rate(Token::Eth, dec!(125000)),
            sample_promptpay(),
            dec!(10000),
        )
        .unwrap();
        assert_eq!(quote.fee.total, quote.fee.network + quote.fee.service);
    }

    #[test]
    fn test_quote_invariant_within_tolerance() {
        // amountCrypto * rate == amountTHB + feeTotal * rate, to a satoshi.
        for (token, rate) in [
            (Token::Usdt, dec!(35.50)),
            (Token::Usdc, MockRateSource::base_rate(Token::Usdc)),
            (Token::Eth, dec!(125000)),
        ] {
            let quote = build_quote(
                dec!(777.77),
                token,
                thb_rate(token, rate),
                sample_promptpay(),
                dec!(10000),
            )
            .unwrap();
            let lhs = quote.amount_crypto * quote.rate.rate;
            let rhs = quote.amount_thb + quote.fee.total * quote.rate.rate;
            assert!((lhs - rhs).abs() < dec!(0.00000001), "{token}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn test_expiry_window_is_three_minutes() {
        let quote = build_quote(
            dec!(10),
            Token::Usdt,
            thb_rate(Token::Usdt, dec!(35.50)),
            sample_promptpay(),
            dec!(10000),
        )
        .unwrap();
        assert_eq!(
            quote.expires_at - quote.created_at,
            TimeDelta::milliseconds(QUOTE_TTL_MS)
        );
        assert!(!quote.is_expired(quote.created_at));
        assert!(quote.is_expired(quote.expires_at + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_amount_bounds_enforced() {
        let rate = thb_rate(Token::Usdt, dec!(35.50));
        assert!(matches!(
            build_quote(dec!(0), Token::Usdt, rate.clone(), sample_promptpay(), dec!(10000)),
            Err(BridgeError::AmountOutOfRange { .. })
        ));
        assert!(matches!(
            build_quote(
                dec!(10001),
                Token::Usdt,
                rate,
                sample_promptpay(),
                dec!(10000)
            ),
            Err(BridgeError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_index_insert_get_remove() {
        let index = QuoteIndex::new();
        let quote = build_quote(
            dec!(10),
            Token::Usdt,
            thb_rate(Token::Usdt, dec!(35.50)),
            sample_promptpay(),
            dec!(10000),
        )
        .unwrap();
        let id = quote.id.clone();

        index.insert(quote);
        assert!(index.get(&id).is_some());
        assert!(index.remove(&id).is_some());
        assert!(index.get(&id).is_none());
    }

    #[test]
    fn test_index_eviction() {
        let index = QuoteIndex::new();
        let mut quote = build_quote(
            dec!(10),
            Token::Usdt,
            thb_rate(Token::Usdt, dec!(35.50)),
            sample_promptpay(),
            dec!(10000),
        )
        .unwrap();
        quote.expires_at = Utc::now() - TimeDelta::seconds(1);
        index.insert(quote);

        assert_eq!(index.evict_expired(Utc::now()), 1);
        assert!(index.is_empty());
    }
}
