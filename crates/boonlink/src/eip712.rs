//! EIP-712 typed-data offline payment authorizations.
//!
//! Provides:
//! - Domain construction ([`payment_domain`])
//! - Signing-hash computation ([`signing_hash`])
//! - Sign / verify ([`sign_authorization`], [`verify_authorization`])
//! - The compact base64 QR envelope ([`encode_envelope`], [`decode_envelope`])
//!
//! An authorization is what a payer signs while offline: a promise to move
//! `amount` base units of `token` to `recipient` before `deadline`. The
//! envelope form is small enough to travel inside a QR code.

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::SolStruct;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{BSC_CHAIN_ID, EIP712_DOMAIN_NAME, EIP712_DOMAIN_VERSION};
use crate::error::BridgeError;
use crate::token::Token;
use crate::Payment;

/// Build the EIP-712 domain for a given verifying contract.
pub fn payment_domain(verifying_contract: Address) -> alloy::sol_types::Eip712Domain {
    alloy::sol_types::Eip712Domain {
        name: Some(std::borrow::Cow::Borrowed(EIP712_DOMAIN_NAME)),
        version: Some(std::borrow::Cow::Borrowed(EIP712_DOMAIN_VERSION)),
        chain_id: Some(U256::from(BSC_CHAIN_ID)),
        verifying_contract: Some(verifying_contract),
        salt: None,
    }
}

/// An offline payment authorization before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineAuthorization {
    pub order_id: String,
    pub token: Token,
    /// Integer base units of the token (18 decimals on BSC).
    pub amount: U256,
    pub recipient: Address,
    pub nonce: u64,
    /// Unix seconds after which the authorization is dead.
    pub deadline: u64,
}

impl OfflineAuthorization {
    fn as_typed(&self) -> Payment {
        Payment {
            orderId: self.order_id.clone(),
            token: self.token.as_str().to_string(),
            amount: self.amount,
            recipient: self.recipient,
            nonce: U256::from(self.nonce),
            deadline: U256::from(self.deadline),
        }
    }
}

/// A signed authorization, ready for envelope encoding.
#[derive(Debug, Clone)]
pub struct SignedAuthorization {
    pub auth: OfflineAuthorization,
    /// 65-byte (r, s, v) signature, 0x-prefixed hex.
    pub signature: String,
    pub signer: Address,
}

/// Outcome of verification. Mirrors the shape callers receive at the tool
/// boundary: never a throw, always a verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthVerification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compute the EIP-712 signing hash for an authorization.
pub fn signing_hash(auth: &OfflineAuthorization, verifying_contract: Address) -> B256 {
    let domain = payment_domain(verifying_contract);
    auth.as_typed().eip712_signing_hash(&domain)
}

/// Sign an authorization, producing the 65-byte hex signature.
pub fn sign_authorization(
    auth: &OfflineAuthorization,
    signer: &PrivateKeySigner,
    verifying_contract: Address,
) -> Result<SignedAuthorization, BridgeError> {
    let hash = signing_hash(auth, verifying_contract);
    let sig = signer
        .sign_hash_sync(&hash)
        .map_err(|e| BridgeError::SignatureInvalid(format!("signing failed: {e}")))?;

    Ok(SignedAuthorization {
        auth: auth.clone(),
        signature: format!("0x{}", hex::encode(sig.as_bytes())),
        signer: signer.address(),
    })
}

/// Verify a signed authorization.
///
/// Checks, in order: signature shape, deadline freshness, and that the
/// recovered address matches the claimed signer. All failures come back as
/// `valid: false` with the recovered signer when one exists.
pub fn verify_authorization(
    signed: &SignedAuthorization,
    verifying_contract: Address,
    now_secs: u64,
) -> AuthVerification {
    let sig_hex = signed.signature.strip_prefix("0x").unwrap_or(&signed.signature);
    let sig_bytes = match hex::decode(sig_hex) {
        Ok(b) => b,
        Err(e) => {
            return AuthVerification {
                valid: false,
                signer: None,
                error: Some(format!("signature is not hex: {e}")),
            }
        }
    };
    if sig_bytes.len() != 65 {
        return AuthVerification {
            valid: false,
            signer: None,
            error: Some(format!("signature must be 65 bytes, got {}", sig_bytes.len())),
        };
    }

    let sig = match Signature::from_raw(&sig_bytes) {
        Ok(s) => s,
        Err(e) => {
            return AuthVerification {
                valid: false,
                signer: None,
                error: Some(format!("invalid signature: {e}")),
            }
        }
    };

    let hash = signing_hash(&signed.auth, verifying_contract);
    let recovered = match sig.recover_address_from_prehash(&hash) {
        Ok(a) => a,
        Err(e) => {
            return AuthVerification {
                valid: false,
                signer: None,
                error: Some(format!("recovery failed: {e}")),
            }
        }
    };

    if signed.auth.deadline < now_secs {
        return AuthVerification {
            valid: false,
            signer: Some(recovered),
            error: Some(BridgeError::SignatureExpired.to_string()),
        };
    }

    // Address equality is byte equality, which makes the hex comparison
    // case-insensitive by construction.
    if recovered != signed.signer {
        return AuthVerification {
            valid: false,
            signer: Some(recovered),
            error: Some("recovered signer does not match claimed signer".to_string()),
        };
    }

    AuthVerification {
        valid: true,
        signer: Some(recovered),
        error: None,
    }
}

/// Compact single-letter wire mapping for the QR envelope.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    o: String,
    t: String,
    a: String,
    r: String,
    n: String,
    d: String,
    s: String,
    f: String,
}

/// Encode a signed authorization as base64(JSON) for transport in a QR.
pub fn encode_envelope(signed: &SignedAuthorization) -> Result<String, BridgeError> {
    let envelope = Envelope {
        o: signed.auth.order_id.clone(),
        t: signed.auth.token.as_str().to_string(),
        a: signed.auth.amount.to_string(),
        r: format!("{}", signed.auth.recipient),
        n: signed.auth.nonce.to_string(),
        d: signed.auth.deadline.to_string(),
        s: signed.signature.clone(),
        f: format!("{}", signed.signer),
    };
    Ok(BASE64.encode(serde_json::to_vec(&envelope)?))
}

/// Decode a QR envelope back into a signed authorization.
///
/// Rejects non-base64 input, missing fields, and non-decimal numeric
/// fields. Signature validity is not checked here; that is
/// [`verify_authorization`]'s job.
pub fn decode_envelope(encoded: &str) -> Result<SignedAuthorization, BridgeError> {
    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|e| BridgeError::InvalidFormat(format!("envelope is not base64: {e}")))?;
    let envelope: Envelope = serde_json::from_slice(&raw)
        .map_err(|e| BridgeError::InvalidFormat(format!("envelope is not valid JSON: {e}")))?;

    let amount = U256::from_str_radix(&envelope.a, 10)
        .map_err(|e| BridgeError::InvalidFormat(format!("non-decimal amount: {e}")))?;
    let nonce: u64 = envelope
        .n
        .parse()
        .map_err(|e| BridgeError::InvalidFormat(format!("non-decimal nonce: {e}")))?;
    let deadline: u64 = envelope
        .d
        .parse()
        .map_err(|e| BridgeError::InvalidFormat(format!("non-decimal deadline: {e}")))?;
    let recipient: Address = envelope
        .r
        .parse()
        .map_err(|e| BridgeError::InvalidFormat(format!("bad recipient address: {e}")))?;
    let signer: Address = envelope
        .f
        .parse()
        .map_err(|e| BridgeError::InvalidFormat(format!("bad signer address: {e}")))?;

    Ok(SignedAuthorization {
        auth: OfflineAuthorization {
            order_id: envelope.o,
            token: Token::parse(&envelope.t)?,
            amount,
            recipient,
            nonce,
            deadline,
        },
        signature: envelope.s,
        signer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_auth() -> OfflineAuthorization {
        OfflineAuthorization {
            order_id: "ord-7f3a".to_string(),
            token: Token::Usdt,
            amount: U256::from(4_408_000_000_000_000_000u128),
            recipient: Address::new([0x11; 20]),
            nonce: 7,
            deadline: u64::MAX,
        }
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let signer = PrivateKeySigner::random();
        let auth = sample_auth();

        let signed = sign_authorization(&auth, &signer, Address::ZERO).unwrap();
        let verdict = verify_authorization(&signed, Address::ZERO, 1_700_000_000);

        assert!(verdict.valid, "verdict: {:?}", verdict.error);
        assert_eq!(verdict.signer, Some(signer.address()));
    }

    #[test]
    fn test_expired_deadline_rejected() {
        let signer = PrivateKeySigner::random();
        let mut auth = sample_auth();
        auth.deadline = 1_000;

        let signed = sign_authorization(&auth, &signer, Address::ZERO).unwrap();
        let verdict = verify_authorization(&signed, Address::ZERO, 2_000);

        assert!(!verdict.valid);
        assert_eq!(verdict.signer, Some(signer.address()));
    }

    #[test]
    fn test_deadline_exactly_now_is_accepted() {
        let signer = PrivateKeySigner::random();
        let mut auth = sample_auth();
        auth.deadline = 5_000;

        let signed = sign_authorization(&auth, &signer, Address::ZERO).unwrap();
        let verdict = verify_authorization(&signed, Address::ZERO, 5_000);
        assert!(verdict.valid);
    }

    #[test]
    fn test_wrong_claimed_signer_rejected() {
        let signer = PrivateKeySigner::random();
        let auth = sample_auth();

        let mut signed = sign_authorization(&auth, &signer, Address::ZERO).unwrap();
        signed.signer = Address::new([0xab; 20]);

        let verdict = verify_authorization(&signed, Address::ZERO, 1_700_000_000);
        assert!(!verdict.valid);
        assert_eq!(verdict.signer, Some(signer.address()));
    }

    #[test]
    fn test_tampered_amount_changes_recovery() {
        let signer = PrivateKeySigner::random();
        let auth = sample_auth();

        let mut signed = sign_authorization(&auth, &signer, Address::ZERO).unwrap();
        signed.auth.amount = U256::from(1u64);

        let verdict = verify_authorization(&signed, Address::ZERO, 1_700_000_000);
        assert!(!verdict.valid);
    }

    #[test]
    fn test_different_domain_contract_changes_hash() {
        let auth = sample_auth();
        let h1 = signing_hash(&auth, Address::ZERO);
        let h2 = signing_hash(&auth, Address::new([0x01; 20]));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_short_signature_rejected() {
        let signed = SignedAuthorization {
            auth: sample_auth(),
            signature: "0xdead".to_string(),
            signer: Address::ZERO,
        };
        let verdict = verify_authorization(&signed, Address::ZERO, 0);
        assert!(!verdict.valid);
        assert!(verdict.error.unwrap().contains("65 bytes"));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let signer = PrivateKeySigner::random();
        let signed = sign_authorization(&sample_auth(), &signer, Address::ZERO).unwrap();

        let encoded = encode_envelope(&signed).unwrap();
        let decoded = decode_envelope(&encoded).unwrap();

        assert_eq!(decoded.auth, signed.auth);
        assert_eq!(decoded.signature, signed.signature);
        assert_eq!(decoded.signer, signed.signer);

        // A decoded envelope still verifies.
        let verdict = verify_authorization(&decoded, Address::ZERO, 1_700_000_000);
        assert!(verdict.valid);
    }

    #[test]
    fn test_envelope_rejects_garbage() {
        assert!(matches!(
            decode_envelope("!!!not-base64!!!"),
            Err(BridgeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_envelope_rejects_missing_field() {
        let json = r#"{"o":"x","t":"USDT","a":"1","r":"0x1111111111111111111111111111111111111111","n":"1","d":"1","s":"0x00"}"#;
        let encoded = BASE64.encode(json);
        assert!(matches!(
            decode_envelope(&encoded),
            Err(BridgeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_envelope_rejects_non_decimal_numeric() {
        let json = r#"{"o":"x","t":"USDT","a":"0xff","r":"0x1111111111111111111111111111111111111111","n":"1","d":"1","s":"0x00","f":"0x1111111111111111111111111111111111111111"}"#;
        let encoded = BASE64.encode(json);
        assert!(matches!(
            decode_envelope(&encoded),
            Err(BridgeError::InvalidFormat(_))
        ));
    }
}
