//! Unverified JWT payload decoding.
//!
//! The backend signs and verifies every token. This side only peeks at the
//! payload segment to learn when the access token expires, so nothing here
//! ever checks a signature and nothing here ever fails loudly: a token that
//! cannot be read is simply treated as having no claims.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// JSON object found in the payload segment of a token.
pub type Claims = Map<String, Value>;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// URL-safe alphabet (what RFC 7519 tokens use), padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Standard alphabet, padding optional. Some issuers emit `+` and `/`.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Why a token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedToken {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),
    #[error("payload segment is not valid base64")]
    Base64,
    #[error("payload segment is not a JSON object")]
    Json,
}

/// Outcome of a soft decode.
///
/// `Absent` and `Malformed` are kept apart so callers (and tests) can tell an
/// empty slot from garbage, even though both end up meaning "no claims".
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Absent,
    Malformed(MalformedToken),
    Present(T),
}

impl<T> Decoded<T> {
    /// Collapse into an `Option`, dropping the reason a value is missing.
    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Present(value) => Some(value),
            Decoded::Absent | Decoded::Malformed(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Decoded::Present(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Decoded::Malformed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Absent => Decoded::Absent,
            Decoded::Malformed(reason) => Decoded::Malformed(reason),
            Decoded::Present(value) => Decoded::Present(f(value)),
        }
    }
}

/// Decode the payload segment of `token` without verifying it.
pub fn decode_payload(token: &str) -> Decoded<Claims> {
    if token.is_empty() {
        return Decoded::Absent;
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Decoded::Malformed(MalformedToken::SegmentCount(segments.len()));
    }

    let payload = segments[1];
    let bytes = match URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))
    {
        Ok(bytes) => bytes,
        Err(_) => return Decoded::Malformed(MalformedToken::Base64),
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Decoded::Present(claims),
        _ => Decoded::Malformed(MalformedToken::Json),
    }
}

/// Expiry of `token` from its `exp` claim (Unix seconds).
///
/// `None` when the claim is missing, not a positive number, or the payload
/// does not decode.
pub fn decode_expiry(token: &str) -> Option<SystemTime> {
    let claims = decode_payload(token).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    if !exp.is_finite() || exp <= 0.0 {
        return None;
    }
    let millis = (exp * 1000.0) as u64;
    Some(UNIX_EPOCH + Duration::from_millis(millis))
}

/// Subject (`sub`) claim of `token`, if readable.
pub fn decode_subject(token: &str) -> Option<String> {
    let claims = decode_payload(token).ok()?;
    match claims.get("sub")? {
        Value::String(sub) => Some(sub.clone()),
        Value::Number(sub) => Some(sub.to_string()),
        _ => None,
    }
}

/// Milliseconds since the Unix epoch, for logging and display.
pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
