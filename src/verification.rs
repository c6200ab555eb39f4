//! Webhook signature verification.
//!
//! PostRun signs every webhook delivery with HMAC-SHA256 over
//! `"{timestamp}.{raw_body}"` and sends the result as
//! `X-PostRun-Signature: sha256=<hex>`. Binding the timestamp into the
//! signed string means a replayed body cannot be paired with a fresh
//! timestamp without invalidating the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Why a webhook request failed authentication.
///
/// Display strings are safe to return to the caller: they name the failure
/// class without echoing the secret or any computed signature.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing webhook signature")]
    MissingCredentials,
    #[error("webhook timestamp expired")]
    TimestampExpired,
    #[error("invalid webhook signature")]
    InvalidSignature,
}

/// Verify a webhook request before its body is parsed.
///
/// `signature` and `timestamp` are the raw `X-PostRun-Signature` and
/// `X-PostRun-Timestamp` header values, if present. Pure validation, no I/O
/// beyond reading the clock.
pub fn verify(
    raw_body: &[u8],
    signature: Option<&str>,
    timestamp: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
) -> Result<(), AuthError> {
    verify_at(
        raw_body,
        signature,
        timestamp,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
}

/// [`verify`] with an explicit clock, so the replay window is testable.
fn verify_at(
    raw_body: &[u8],
    signature: Option<&str>,
    timestamp: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), AuthError> {
    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingCredentials)?;
    let timestamp = timestamp
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredentials)?;
    if secret.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    // Replay check first; a non-numeric timestamp can never fall inside the
    // window, so it gets the same rejection.
    let ts: i64 = timestamp.parse().map_err(|_| AuthError::TimestampExpired)?;
    // abs_diff: `now - ts` would overflow on extreme attacker-supplied
    // timestamps like i64::MIN, and this runs before authentication.
    if now.abs_diff(ts) > tolerance_secs.max(0) as u64 {
        return Err(AuthError::TimestampExpired);
    }

    let sig_hex = signature
        .strip_prefix("sha256=")
        .ok_or(AuthError::InvalidSignature)?;
    let sig_bytes = hex::decode(sig_hex).map_err(|_| AuthError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(raw_body);

    // verify_slice is constant-time; never compare the hex strings directly.
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidSignature)
}

/// Compute the `X-PostRun-Signature` header value for a body and timestamp.
///
/// Counterpart of [`verify`], used by tests and by anyone simulating the
/// provider against a local endpoint.
pub fn sign(secret: &str, timestamp: &str, raw_body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_12345";
    const NOW: i64 = 1_700_000_000;

    fn signed_headers(body: &[u8], ts: i64) -> (String, String) {
        let timestamp = ts.to_string();
        let signature = sign(SECRET, &timestamp, body);
        (signature, timestamp)
    }

    #[test]
    fn valid_signature_passes() {
        let body = br#"{"message":{"id":"m1"}}"#;
        let (sig, ts) = signed_headers(body, NOW);
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), SECRET, 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn missing_headers_or_secret_rejected() {
        let body = b"{}";
        let (sig, ts) = signed_headers(body, NOW);
        assert_eq!(
            verify_at(body, None, Some(&ts), SECRET, 300, NOW),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            verify_at(body, Some(&sig), None, SECRET, 300, NOW),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), "", 300, NOW),
            Err(AuthError::MissingCredentials)
        );
        // Empty header values count as absent
        assert_eq!(
            verify_at(body, Some(""), Some(&ts), SECRET, 300, NOW),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn expired_timestamp_rejected_even_with_valid_signature() {
        let body = b"{}";
        let (sig, ts) = signed_headers(body, NOW - 600);
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), SECRET, 300, NOW),
            Err(AuthError::TimestampExpired)
        );
        // Future timestamps outside the window are equally stale
        let (sig, ts) = signed_headers(body, NOW + 600);
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), SECRET, 300, NOW),
            Err(AuthError::TimestampExpired)
        );
    }

    #[test]
    fn timestamp_on_window_edge_passes() {
        let body = b"{}";
        let (sig, ts) = signed_headers(body, NOW - 300);
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), SECRET, 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn extreme_timestamps_rejected_without_overflow() {
        let body = b"{}";
        for ts in [i64::MIN.to_string(), i64::MAX.to_string()] {
            let sig = sign(SECRET, &ts, body);
            assert_eq!(
                verify_at(body, Some(&sig), Some(&ts), SECRET, 300, NOW),
                Err(AuthError::TimestampExpired)
            );
        }
    }

    #[test]
    fn garbage_timestamp_rejected_as_expired() {
        let body = b"{}";
        let sig = sign(SECRET, "not-a-number", body);
        assert_eq!(
            verify_at(body, Some(&sig), Some("not-a-number"), SECRET, 300, NOW),
            Err(AuthError::TimestampExpired)
        );
    }

    #[test]
    fn tampered_body_rejected() {
        let (sig, ts) = signed_headers(br#"{"event_data":{"a":1}}"#, NOW);
        assert_eq!(
            verify_at(
                br#"{"event_data":{"a":2}}"#,
                Some(&sig),
                Some(&ts),
                SECRET,
                300,
                NOW
            ),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn signature_binds_timestamp() {
        // A validly signed old body replayed with a fresh timestamp must fail.
        let body = b"{}";
        let (old_sig, _) = signed_headers(body, NOW - 600);
        let fresh_ts = NOW.to_string();
        assert_eq!(
            verify_at(body, Some(&old_sig), Some(&fresh_ts), SECRET, 300, NOW),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"{}";
        let (sig, ts) = signed_headers(body, NOW);
        assert_eq!(
            verify_at(body, Some(&sig), Some(&ts), "other_secret", 300, NOW),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn malformed_signature_header_rejected() {
        let body = b"{}";
        let ts = NOW.to_string();
        for bad in ["deadbeef", "sha256=", "sha256=zzzz", "sha1=deadbeef"] {
            assert_eq!(
                verify_at(body, Some(bad), Some(&ts), SECRET, 300, NOW),
                Err(AuthError::InvalidSignature),
                "header {bad:?} should be invalid"
            );
        }
    }
}
