//! Stripe webhook signature verification.
//!
//! HMAC-SHA256 over `"{timestamp}.{payload}"` keyed by the endpoint secret,
//! compared in constant time, with a replay window on the signed timestamp.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::stripe_event::StripeEvent;
use super::webhook_errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age for signed events (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every v1 signature in the header. Stripe sends more than one while an
    /// endpoint secret is being rolled.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>[,v1=...][,v0=<legacy>]`.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value.trim()).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                // v0 and unknown schemes are not trusted
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for Stripe webhook signatures.
pub struct WebhookSignatureVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the signature against the current clock and parses the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        self.verify_and_parse_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify_and_parse`](Self::verify_and_parse) with an explicit clock.
    ///
    /// Nothing is deserialized until the signature has been accepted.
    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        self.validate_timestamp(header.timestamp, now)?;

        let expected = compute_signature(self.secret.expose_secret(), header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            tracing::warn!(timestamp = header.timestamp, "Webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let age = now - timestamp;

        if age > self.tolerance_secs {
            tracing::warn!(age_secs = age, "Webhook event too old, possible replay");
            return Err(WebhookError::TimestampOutOfRange);
        }

        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        Ok(())
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a `Stripe-Signature` header value for `payload`.
///
/// Used to replay captured events against a local instance.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"invoice.payment_failed","created":1704067200,"data":{"object":{"id":"in_1"}},"livemode":false}"#;
    const NOW: i64 = 1_704_067_200;

    fn verifier() -> WebhookSignatureVerifier {
        WebhookSignatureVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    // ══════════════════════════════════════════════════════════════
    // Header Parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parses_timestamp_and_signature() {
        let header = SignatureHeader::parse("t=1704067200,v1=abcd").unwrap();
        assert_eq!(header.timestamp, 1_704_067_200);
        assert_eq!(header.v1_signatures, vec![vec![0xab, 0xcd]]);
    }

    #[test]
    fn collects_multiple_v1_signatures() {
        let header = SignatureHeader::parse("t=1,v1=aa,v0=ff,v1=bb").unwrap();
        assert_eq!(header.v1_signatures.len(), 2);
    }

    #[test]
    fn rejects_missing_timestamp() {
        assert!(matches!(
            SignatureHeader::parse("v1=abcd"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn rejects_missing_v1() {
        assert!(matches!(
            SignatureHeader::parse("t=1,v0=abcd"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(SignatureHeader::parse("t=1,v1=zz").is_err());
    }

    #[test]
    fn rejects_empty_header() {
        assert!(SignatureHeader::parse("").is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn accepts_valid_signature() {
        let header = signature_header(TEST_SECRET, NOW, PAYLOAD.as_bytes()).unwrap();
        let event = verifier()
            .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
            .unwrap();
        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn rejects_signature_from_other_secret() {
        let header = signature_header("whsec_other", NOW, PAYLOAD.as_bytes()).unwrap();
        assert_eq!(
            verifier()
                .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidSignature
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = signature_header(TEST_SECRET, NOW, PAYLOAD.as_bytes()).unwrap();
        let tampered = PAYLOAD.replace("in_1", "in_2");
        assert_eq!(
            verifier()
                .verify_and_parse_at(tampered.as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidSignature
        );
    }

    #[test]
    fn accepts_any_matching_v1_during_secret_roll() {
        let good = signature_header(TEST_SECRET, NOW, PAYLOAD.as_bytes()).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert!(verifier()
            .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
            .is_ok());
    }

    #[test]
    fn rejects_expired_timestamp() {
        let ts = NOW - DEFAULT_TOLERANCE_SECS - 1;
        let header = signature_header(TEST_SECRET, ts, PAYLOAD.as_bytes()).unwrap();
        assert_eq!(
            verifier()
                .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::TimestampOutOfRange
        );
    }

    #[test]
    fn rejects_future_timestamp_beyond_skew() {
        let ts = NOW + MAX_CLOCK_SKEW_SECS + 1;
        let header = signature_header(TEST_SECRET, ts, PAYLOAD.as_bytes()).unwrap();
        assert_eq!(
            verifier()
                .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidTimestamp
        );
    }

    #[test]
    fn tolerates_small_future_skew() {
        let ts = NOW + 30;
        let header = signature_header(TEST_SECRET, ts, PAYLOAD.as_bytes()).unwrap();
        assert!(verifier()
            .verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW)
            .is_ok());
    }

    #[test]
    fn signed_garbage_is_a_parse_error() {
        let payload = b"not json";
        let header = signature_header(TEST_SECRET, NOW, payload).unwrap();
        assert!(matches!(
            verifier().verify_and_parse_at(payload, &header, NOW),
            Err(WebhookError::ParseError(_))
        ));
    }
}
