//! Payment processor webhook signature verification.
//!
//! The processor signs each delivery with an HMAC-SHA256 over
//! `"{timestamp}." + raw_body`, sent as `X-Processor-Signature:
//! t={timestamp},v1={hex}`. Verification happens over the raw body bytes
//! before any JSON parsing, and the timestamp is bounded to reject replayed
//! deliveries. A malformed header is an error; a well-formed header that
//! fails verification is `Ok(false)`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Invalid signing key")]
    Key,
}

/// Verifies processor webhook signatures against a shared secret.
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify `header` against the raw request body.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<bool, SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verification against an explicit clock, for tests.
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<bool, SignatureError> {
        let (timestamp, provided_hex) = parse_header(header)?;

        if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Ok(false);
        }

        let expected = self.compute(payload, timestamp)?;
        let provided = match hex::decode(provided_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        Ok(expected.ct_eq(&provided).into())
    }

    /// Compute the signature for `payload` at `timestamp`. Exposed so tests
    /// and local tooling can sign deliveries.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let mac = self.compute(payload, timestamp)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(mac)))
    }

    fn compute(&self, payload: &[u8], timestamp: i64) -> Result<Vec<u8>, SignatureError> {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return Err(SignatureError::Key);
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Extract `(timestamp, hex signature)` from a `t=...,v1=...` header.
fn parse_header(header: &str) -> Result<(i64, &str), SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        if let Some(raw) = part.trim().strip_prefix("t=") {
            timestamp = raw.parse::<i64>().ok();
        } else if let Some(raw) = part.trim().strip_prefix("v1=") {
            signature = Some(raw);
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) if !s.is_empty() => Ok((t, s)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Length-then-content constant-time comparison for shared-secret headers.
pub fn constant_time_eq(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"token\":\"tok_1\",\"event_type\":\"payment.completed\"}";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET)
    }

    #[test]
    fn valid_signature_is_accepted() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now).unwrap();

        assert!(verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now().timestamp();
        let header = SignatureVerifier::new("wrong_secret")
            .sign(PAYLOAD, now)
            .unwrap();

        assert!(!verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn modified_payload_is_rejected() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now).unwrap();

        let tampered = b"{\"token\":\"tok_1\",\"event_type\":\"payment.completed\",\"extra\":1}";
        assert!(!verifier().verify_at(tampered, &header, now).unwrap());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let now = Utc::now().timestamp();
        // Ten minutes old, beyond the five-minute tolerance.
        let header = verifier().sign(PAYLOAD, now - 600).unwrap();

        assert!(!verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn future_timestamp_beyond_tolerance_is_rejected() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now + 600).unwrap();

        assert!(!verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn timestamp_within_tolerance_is_accepted() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now - 120).unwrap();

        assert!(verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn malformed_headers_error() {
        let now = Utc::now().timestamp();
        for header in ["", "garbage", "t=123", "v1=abcdef", "t=notanumber,v1=abcdef"] {
            assert_eq!(
                verifier().verify_at(PAYLOAD, header, now),
                Err(SignatureError::MalformedHeader),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn non_hex_signature_fails_closed() {
        let now = Utc::now().timestamp();
        let header = format!("t={now},v1=zzzz-not-hex");

        assert!(!verifier().verify_at(PAYLOAD, &header, now).unwrap());
    }

    #[test]
    fn binary_payload_round_trips() {
        let now = Utc::now().timestamp();
        let payload = [0x00, 0x01, 0x02, 0xFF, 0xFE, 0xFD];
        let header = verifier().sign(&payload, now).unwrap();

        assert!(verifier().verify_at(&payload, &header, now).unwrap());
    }

    #[test]
    fn shared_token_comparison() {
        assert!(constant_time_eq("tok-abc", "tok-abc"));
        assert!(!constant_time_eq("tok-abc", "tok-abd"));
        assert!(!constant_time_eq("tok-abc", "tok-abc-longer"));
        assert!(!constant_time_eq("tok-abc", ""));
    }
}
