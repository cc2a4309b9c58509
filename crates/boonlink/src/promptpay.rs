//! EMVCo / PromptPay QR codec.
//!
//! Parses and generates the flat TLV payload used by Thai PromptPay QR
//! codes: each record is a two-digit ASCII tag, a two-digit ASCII length,
//! then `length` characters of value. The merchant-account-info record
//! (tag 29 or 30) nests a second TLV stream carrying the PromptPay AID and
//! the beneficiary identifier. Payload integrity is a CRC-16/CCITT-FALSE
//! over everything but the trailing four hex characters.
//!
//! Parsing is pure and synchronous. A CRC mismatch does not abort the
//! parse; it is recorded in [`PromptPayData::is_valid`] and left for the
//! tool layer to act on.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// PromptPay Application Identifier (sub-tag 00 of the merchant info).
pub const PROMPTPAY_AID: &str = "A000000677010111";

/// ISO-4217 numeric code for THB.
pub const CURRENCY_THB: &str = "764";

const TAG_PAYLOAD_FORMAT: &str = "00";
const TAG_POI_METHOD: &str = "01";
const TAG_MERCHANT_INFO_29: &str = "29";
const TAG_MERCHANT_INFO_30: &str = "30";
const TAG_CURRENCY: &str = "53";
const TAG_AMOUNT: &str = "54";
const TAG_COUNTRY: &str = "58";
const TAG_MERCHANT_NAME: &str = "59";
const TAG_CRC: &str = "63";

const SUB_TAG_AID: &str = "00";
const SUB_TAG_PHONE: &str = "01";
const SUB_TAG_NATIONAL_ID: &str = "02";

/// How the beneficiary is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Phone,
    NationalId,
}

/// A parsed PromptPay QR payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayData {
    /// Normalized identifier: 10-digit phone or 13-digit national id.
    pub account_id: String,
    pub account_type: AccountType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    /// Pre-filled amount in THB for static-amount QRs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// ISO-4217 numeric currency code ("764" for THB).
    pub currency: String,
    /// ISO-3166 country code ("TH").
    pub country: String,
    /// The whitespace-stripped input the parse ran over.
    pub raw_payload: String,
    /// Outcome of the CRC check. Independent of parse success.
    pub is_valid: bool,
}

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no xor-out.
/// Other CCITT variants fail real-world PromptPay payloads.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// One decoded TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TlvRecord {
    tag: String,
    value: String,
}

/// Decode a flat TLV stream. Lengths count characters, not bytes, so Thai
/// merchant names survive.
fn parse_tlv(payload: &str) -> Result<Vec<TlvRecord>, BridgeError> {
    let chars: Vec<char> = payload.chars().collect();
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if pos + 4 > chars.len() {
            return Err(BridgeError::InvalidFormat(format!(
                "truncated TLV header at offset {pos}"
            )));
        }
        let tag: String = chars[pos..pos + 2].iter().collect();
        let len_str: String = chars[pos + 2..pos + 4].iter().collect();
        if !tag.chars().all(|c| c.is_ascii_digit()) {
            return Err(BridgeError::InvalidFormat(format!(
                "non-numeric tag {tag:?} at offset {pos}"
            )));
        }
        let len: usize = len_str
            .parse()
            .map_err(|_| BridgeError::InvalidFormat(format!("non-numeric length {len_str:?}")))?;
        if pos + 4 + len > chars.len() {
            return Err(BridgeError::InvalidFormat(format!(
                "value of tag {tag} overruns payload ({len} chars declared)"
            )));
        }
        let value: String = chars[pos + 4..pos + 4 + len].iter().collect();
        records.push(TlvRecord { tag, value });
        pos += 4 + len;
    }

    Ok(records)
}

fn find<'a>(records: &'a [TlvRecord], tag: &str) -> Option<&'a str> {
    records
        .iter()
        .find(|r| r.tag == tag)
        .map(|r| r.value.as_str())
}

/// Normalize a raw beneficiary identifier from the merchant-info sub-TLV.
///
/// Country-prefixed phones arrive as `0066XXXXXXXXX`; the prefix is dropped
/// and the national leading zero restored. Length decides the type.
fn normalize_account_id(raw: &str) -> Result<(String, AccountType), BridgeError> {
    let stripped = if raw.starts_with("00") && raw.chars().count() > 4 {
        raw.chars().skip(4).collect::<String>()
    } else {
        raw.to_string()
    };

    match stripped.chars().count() {
        13 => Ok((stripped, AccountType::NationalId)),
        10 => Ok((stripped, AccountType::Phone)),
        9 => Ok((format!("0{stripped}"), AccountType::Phone)),
        n => Err(BridgeError::InvalidAccountId(format!(
            "identifier has {n} characters after normalization"
        ))),
    }
}

/// Check the trailing CRC against the rest of the payload.
fn crc_matches(payload: &str) -> bool {
    let chars: Vec<char> = payload.chars().collect();
    if chars.len() < 4 {
        return false;
    }
    let body: String = chars[..chars.len() - 4].iter().collect();
    let declared: String = chars[chars.len() - 4..].iter().collect();
    let computed = format!("{:04X}", crc16_ccitt_false(body.as_bytes()));
    computed == declared.to_ascii_uppercase()
}

/// Parse a PromptPay QR payload.
///
/// Structural errors (`InvalidFormat`, `NotPromptPay`, `InvalidAccountId`)
/// abort the parse; a CRC mismatch does not.
pub fn parse(input: &str) -> Result<PromptPayData, BridgeError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.chars().count() < 20 {
        return Err(BridgeError::InvalidFormat(
            "payload shorter than 20 characters".to_string(),
        ));
    }

    let is_valid = crc_matches(&cleaned);
    let records = parse_tlv(&cleaned)?;

    match find(&records, TAG_PAYLOAD_FORMAT) {
        Some("01") => {}
        Some(other) => {
            return Err(BridgeError::InvalidFormat(format!(
                "unsupported payload format indicator {other:?}"
            )))
        }
        None => {
            return Err(BridgeError::InvalidFormat(
                "missing payload format indicator".to_string(),
            ))
        }
    }

    let merchant_info = find(&records, TAG_MERCHANT_INFO_29)
        .or_else(|| find(&records, TAG_MERCHANT_INFO_30))
        .ok_or(BridgeError::NotPromptPay)?;

    let sub_records = parse_tlv(merchant_info)?;
    match find(&sub_records, SUB_TAG_AID) {
        Some(aid) if aid.eq_ignore_ascii_case(PROMPTPAY_AID) => {}
        _ => return Err(BridgeError::NotPromptPay),
    }

    let raw_id = find(&sub_records, SUB_TAG_PHONE)
        .or_else(|| find(&sub_records, SUB_TAG_NATIONAL_ID))
        .ok_or_else(|| {
            BridgeError::InvalidAccountId("merchant info carries no identifier".to_string())
        })?;
    let (account_id, account_type) = normalize_account_id(raw_id)?;

    let amount = match find(&records, TAG_AMOUNT) {
        Some(v) => Some(v.parse::<Decimal>().map_err(|_| {
            BridgeError::InvalidFormat(format!("unparseable amount {v:?}"))
        })?),
        None => None,
    };

    Ok(PromptPayData {
        account_id,
        account_type,
        merchant_name: find(&records, TAG_MERCHANT_NAME).map(str::to_string),
        amount,
        currency: find(&records, TAG_CURRENCY)
            .unwrap_or(CURRENCY_THB)
            .to_string(),
        country: find(&records, TAG_COUNTRY).unwrap_or("TH").to_string(),
        raw_payload: cleaned,
        is_valid,
    })
}

fn tlv(tag: &str, value: &str) -> String {
    format!("{tag}{:02}{value}", value.chars().count())
}

/// Render an amount the way PromptPay expects it: two decimal places.
fn format_amount(amount: Decimal) -> String {
    let cents = (amount * Decimal::from(100)).round().to_i64().unwrap_or(0);
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

/// Generate a PromptPay QR payload for the given beneficiary.
///
/// `account_id` must be a 9- or 10-digit phone number or a 13-digit
/// national id. A present `amount` produces a dynamic (POI 12) payload.
pub fn generate(account_id: &str, amount: Option<Decimal>) -> Result<String, BridgeError> {
    if !account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(BridgeError::InvalidAccountId(format!(
            "non-digit characters in {account_id:?}"
        )));
    }

    let sub = match account_id.chars().count() {
        13 => tlv(SUB_TAG_NATIONAL_ID, &format!("00TH{account_id}")),
        9 | 10 => {
            let national = account_id.strip_prefix('0').unwrap_or(account_id);
            tlv(SUB_TAG_PHONE, &format!("0066{national}"))
        }
        n => {
            return Err(BridgeError::InvalidAccountId(format!(
                "identifier has {n} digits"
            )))
        }
    };

    let mut payload = String::new();
    payload.push_str(&tlv(TAG_PAYLOAD_FORMAT, "01"));
    payload.push_str(&tlv(
        TAG_POI_METHOD,
        if amount.is_some() { "12" } else { "11" },
    ));
    let merchant_info = format!("{}{sub}", tlv(SUB_TAG_AID, PROMPTPAY_AID));
    payload.push_str(&tlv(TAG_MERCHANT_INFO_29, &merchant_info));
    payload.push_str(&tlv(TAG_CURRENCY, CURRENCY_THB));
    if let Some(amount) = amount {
        payload.push_str(&tlv(TAG_AMOUNT, &format_amount(amount)));
    }
    payload.push_str(&tlv(TAG_COUNTRY, "TH"));

    payload.push_str(TAG_CRC);
    payload.push_str("04");
    let crc = crc16_ccitt_false(payload.as_bytes());
    payload.push_str(&format!("{crc:04X}"));

    Ok(payload)
}
