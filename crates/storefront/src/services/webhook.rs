//! Order-completion webhook signatures.
//!
//! The payment side signs each request with the shared webhook secret:
//!
//! ```text
//! x-marigold-timestamp: <unix seconds>
//! x-marigold-signature: v1=<hex hmac-sha256 of "v1:{timestamp}:{body}">
//! ```
//!
//! Requests more than five minutes from the server clock are rejected to
//! prevent replay.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

/// Header carrying the signing timestamp.
pub const TIMESTAMP_HEADER: &str = "x-marigold-timestamp";

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-marigold-signature";

/// Maximum allowed clock skew in seconds.
const MAX_SKEW_SECONDS: u64 = 300;

const SIGNATURE_VERSION: &str = "v1";

/// Errors that can occur verifying a webhook signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("request timestamp outside the allowed window")]
    StaleTimestamp,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("invalid signing key")]
    InvalidKey,
}

/// Compute the signature header value for a body.
///
/// # Errors
///
/// Returns `WebhookError::InvalidKey` if the secret cannot key an HMAC.
pub fn sign(secret: &SecretString, timestamp: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| WebhookError::InvalidKey)?;

    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);

    Ok(format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a webhook signature against the current time `now` (unix seconds).
///
/// # Errors
///
/// Returns `WebhookError::InvalidTimestamp` if the timestamp is not an integer,
/// `WebhookError::StaleTimestamp` if it is too far from `now`, and
/// `WebhookError::SignatureMismatch` if the signature does not match.
#[instrument(skip_all)]
pub fn verify_signature(
    secret: &SecretString,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| WebhookError::InvalidTimestamp)?;

    if now.abs_diff(ts) > MAX_SKEW_SECONDS {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = sign(secret, timestamp.trim(), body)?;

    if !constant_time_compare(&expected, signature.trim()) {
        return Err(WebhookError::SignatureMismatch);
    }

    debug!("Webhook signature verified");
    Ok(())
}

/// Compare two strings without short-circuiting on the first difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
