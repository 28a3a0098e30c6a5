//! # Webhook Signature Verification
//!
//! MercadoPago signs notifications with an `x-signature` header of the form
//! `ts=<unix>,v1=<hex hmac>`. The signed manifest is built from the
//! notification's `data.id`, the `x-request-id` header and the timestamp:
//!
//! ```text
//! id:<data.id>;request-id:<x-request-id>;ts:<ts>;
//! ```
//!
//! Parts whose source value is absent are left out of the manifest.

use chrono::Utc;
use hmac::{Hmac, Mac};
use pay_core::PaymentError;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a notification signature was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing x-signature header")]
    MissingHeader,

    #[error("Malformed x-signature header: {0}")]
    Malformed(String),

    #[error("Timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

impl From<SignatureError> for PaymentError {
    fn from(err: SignatureError) -> Self {
        PaymentError::WebhookVerificationFailed(err.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: String,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ts" => timestamp = Some(value.trim().to_string()),
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| SignatureError::Malformed("missing ts".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed("missing v1".to_string()));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Build the signed manifest
pub fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut out = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        // Alphanumeric ids are signed lowercased
        out.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        out.push_str(&format!("request-id:{};", request_id));
    }
    out.push_str(&format!("ts:{};", ts));
    out
}

fn compute_hmac_sha256(secret: &str, message: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Unix seconds from a header timestamp; millisecond values are accepted too
fn timestamp_secs(ts: &str) -> Option<i64> {
    let value: i64 = ts.parse().ok()?;
    if value > 100_000_000_000 {
        Some(value / 1000)
    } else {
        Some(value)
    }
}

/// Verifies `x-signature` headers against the shared webhook secret
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: 300,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn verify(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<(), SignatureError> {
        self.verify_at(signature, request_id, data_id, Utc::now().timestamp())
    }

    /// Verify against an explicit clock
    pub fn verify_at(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(SignatureError::MissingHeader)?;
        let parsed = parse_signature_header(header)?;

        let ts = timestamp_secs(&parsed.timestamp)
            .ok_or_else(|| SignatureError::Malformed("ts is not a number".to_string()))?;
        let skew = now.checked_sub(ts).map(i64::unsigned_abs);
        if skew.map_or(true, |skew| skew > self.tolerance_secs.unsigned_abs()) {
            return Err(SignatureError::Expired);
        }

        let signed = manifest(data_id, request_id, &parsed.timestamp);
        let expected = compute_hmac_sha256(&self.secret, &signed).ok_or(SignatureError::Mismatch)?;

        if parsed
            .signatures
            .iter()
            .any(|sig| constant_time_compare(&sig.to_lowercase(), &expected))
        {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Produce a header value the way MercadoPago would (used by tests and local tooling)
    pub fn sign(&self, data_id: Option<&str>, request_id: Option<&str>, ts: i64) -> String {
        let ts = ts.to_string();
        let digest = compute_hmac_sha256(&self.secret, &manifest(data_id, request_id, &ts))
            .unwrap_or_default();
        format!("ts={},v1={}", ts, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_718_900_000;

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("ts=1718900000, v1=abc123").unwrap();
        assert_eq!(parsed.timestamp, "1718900000");
        assert_eq!(parsed.signatures, vec!["abc123".to_string()]);

        assert!(matches!(
            parse_signature_header("v1=abc"),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            parse_signature_header("ts=1"),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_manifest() {
        assert_eq!(
            manifest(Some("ABC123"), Some("req-1"), "1718900000"),
            "id:abc123;request-id:req-1;ts:1718900000;"
        );
        assert_eq!(manifest(None, None, "1"), "ts:1;");
    }

    #[test]
    fn test_hmac_sha256() {
        let sig = compute_hmac_sha256("secret", "ts:1;").unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_round_trip_and_tamper() {
        let verifier = SignatureVerifier::new("whsec");
        let header = verifier.sign(Some("123"), Some("req-1"), NOW);

        assert!(verifier
            .verify_at(Some(&header), Some("req-1"), Some("123"), NOW)
            .is_ok());
        assert_eq!(
            verifier.verify_at(Some(&header), Some("req-1"), Some("124"), NOW),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier.verify_at(Some(&header), Some("req-2"), Some("123"), NOW),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            SignatureVerifier::new("other").verify_at(Some(&header), Some("req-1"), Some("123"), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_tolerance() {
        let verifier = SignatureVerifier::new("whsec");
        let header = verifier.sign(Some("123"), None, NOW - 301);
        assert_eq!(
            verifier.verify_at(Some(&header), None, Some("123"), NOW),
            Err(SignatureError::Expired)
        );

        let relaxed = verifier.with_tolerance(600);
        assert!(relaxed.verify_at(Some(&header), None, Some("123"), NOW).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let verifier = SignatureVerifier::new("whsec");
        for ts in [i64::MIN, i64::MIN + 1, -NOW] {
            let header = verifier.sign(Some("123"), None, ts);
            assert_eq!(
                verifier.verify_at(Some(&header), None, Some("123"), NOW),
                Err(SignatureError::Expired)
            );
        }

        let header = "ts=-9223372036854775808,v1=00";
        assert_eq!(
            verifier.verify_at(Some(header), None, Some("123"), NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_missing_header() {
        let verifier = SignatureVerifier::new("whsec");
        assert_eq!(
            verifier.verify_at(None, None, Some("1"), NOW),
            Err(SignatureError::MissingHeader)
        );

        let err: PaymentError = SignatureError::MissingHeader.into();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_millisecond_timestamp() {
        let verifier = SignatureVerifier::new("whsec");
        let header = verifier.sign(Some("9"), None, NOW * 1000);
        assert!(verifier.verify_at(Some(&header), None, Some("9"), NOW).is_ok());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
