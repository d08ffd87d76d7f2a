//! Replay-protection nonces.
//!
//! Wire form: `YYYY-MM-DDTHH:MM:SSZ` immediately followed by a salt of
//! printable, non-space ASCII, e.g. `2024-05-01T12:00:00Zab12CD`.

use chrono::{DateTime, NaiveDateTime, Utc};

use oid_crypto::nonce_salt;

use crate::error::{ConsumerError, ConsumerResult};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIME_LEN: usize = "YYYY-MM-DDTHH:MM:SSZ".len();

/// Creates a nonce for the current time with a random salt.
#[must_use]
pub fn make_nonce() -> String {
    make_nonce_at(Utc::now().timestamp(), &nonce_salt())
}

/// Creates a nonce for a given Unix timestamp and salt.
///
/// Timestamps chrono cannot represent are clamped to the epoch.
#[must_use]
pub fn make_nonce_at(timestamp: i64, salt: &str) -> String {
    let time = DateTime::from_timestamp(timestamp, 0).unwrap_or_default();
    format!("{}{salt}", time.format(TIME_FORMAT))
}

/// Splits a nonce into its Unix timestamp and salt.
///
/// # Errors
///
/// Returns [`ConsumerError::MalformedNonce`] unless the input is a strict
/// timestamp followed by a non-empty printable salt.
pub fn split_nonce(nonce: &str) -> ConsumerResult<(i64, &str)> {
    let malformed = || ConsumerError::MalformedNonce(nonce.to_string());

    let (Some(time), Some(salt)) = (nonce.get(..TIME_LEN), nonce.get(TIME_LEN..)) else {
        return Err(malformed());
    };
    if salt.is_empty() || !salt.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(malformed());
    }

    let parsed = NaiveDateTime::parse_from_str(time, TIME_FORMAT).map_err(|_| malformed())?;
    let timestamp = parsed.and_utc().timestamp();
    // chrono tolerates unpadded fields; only the canonical rendering is valid.
    if parsed.format(TIME_FORMAT).to_string() != time {
        return Err(malformed());
    }
    Ok((timestamp, salt))
}
