//! Time-bound HMAC-SHA256 request signatures.
//!
//! A request carries three headers: a decimal UNIX timestamp, an opaque base64
//! claims blob and a signature over `"<timestamp>.<claims>"` keyed with a shared
//! secret. Verification checks the cheap preconditions first and only then
//! recomputes the MAC.

use std::num::ParseIntError;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::clock::ClockSource;
use crate::crypto::encoding;

pub const HEADER_TIMESTAMP: &str = "X-Auth-Ts";
pub const HEADER_CLAIMS: &str = "X-Auth-Claims";
pub const HEADER_SIGNATURE: &str = "X-Auth-Sig";

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signed request is denied. Callers should answer all of them with
/// a plain "unauthorized".
#[derive(Debug, Error)]
pub enum AuthSigError {
    #[error("missing required auth headers")]
    MissingHeaders,
    #[error("invalid X-Auth-Ts: {0}")]
    BadTimestamp(#[source] ParseIntError),
    #[error("X-Auth-Ts out of allowed range")]
    TimestampOutOfRange,
    #[error("invalid X-Auth-Sig")]
    SignatureMismatch,
}

/// The three textual auth headers of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    pub timestamp: String,
    pub claims: String,
    pub signature: String,
}

impl AuthHeaders {
    pub fn new(
        timestamp: impl Into<String>,
        claims: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            claims: claims.into(),
            signature: signature.into(),
        }
    }

    /// Pulls the headers out of any header map. An absent header is kept as an
    /// empty value so verification reports it as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            timestamp: lookup(HEADER_TIMESTAMP).unwrap_or_default(),
            claims: lookup(HEADER_CLAIMS).unwrap_or_default(),
            signature: lookup(HEADER_SIGNATURE).unwrap_or_default(),
        }
    }

    /// Builds a signed header set for `claims`, stamped with the clock's current time.
    pub fn sign(secret: &[u8], claims: &str, clock: &ClockSource) -> Self {
        let timestamp = clock.epoch_seconds().to_string();
        let signature = compute_signature(secret, &timestamp, claims);
        Self {
            timestamp,
            claims: claims.to_string(),
            signature,
        }
    }

    /// Header name and value pairs, in wire order.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (HEADER_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_CLAIMS, self.claims.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }

    pub fn verify(
        &self,
        secret: &[u8],
        max_skew: Duration,
        clock: &ClockSource,
    ) -> Result<(), AuthSigError> {
        verify_signature(
            secret,
            &self.timestamp,
            &self.claims,
            &self.signature,
            max_skew,
            clock,
        )
    }
}

/// Computes the base64 (unpadded) HMAC-SHA256 of `"<timestamp>.<claims>"`.
///
/// Fields are joined with a literal `.` and are not length-prefixed; each must be
/// unambiguous on its own (decimal digits, base64 text).
pub fn compute_signature(secret: &[u8], timestamp: &str, claims: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(claims.as_bytes());
    encoding::encode(&mac.finalize().into_bytes())
}

/// Verifies a signed request against `secret`.
///
/// Checks run in order and stop at the first failure: all headers present,
/// timestamp parses, timestamp within `max_skew` of now (inclusive, both
/// directions, window truncated to whole seconds), signature matches.
pub fn verify_signature(
    secret: &[u8],
    timestamp: &str,
    claims: &str,
    signature: &str,
    max_skew: Duration,
    clock: &ClockSource,
) -> Result<(), AuthSigError> {
    if timestamp.is_empty() || claims.is_empty() || signature.is_empty() {
        debug!("auth denied: missing headers");
        return Err(AuthSigError::MissingHeaders);
    }

    let ts: i64 = timestamp.parse().map_err(|e| {
        debug!("auth denied: unparseable timestamp");
        AuthSigError::BadTimestamp(e)
    })?;

    let now = clock.epoch_seconds();
    let skew = i64::try_from(max_skew.as_secs()).unwrap_or(i64::MAX);
    if ts < now.saturating_sub(skew) || ts > now.saturating_add(skew) {
        debug!(ts, now, skew, "auth denied: timestamp outside skew window");
        return Err(AuthSigError::TimestampOutOfRange);
    }

    let expected = compute_signature(secret, timestamp, claims);
    if !encoding::constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        debug!("auth denied: signature mismatch");
        return Err(AuthSigError::SignatureMismatch);
    }

    Ok(())
}
