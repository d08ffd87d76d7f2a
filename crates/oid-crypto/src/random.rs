//! Cryptographically secure random number generation.
//!
//! Used for:
//! - Diffie-Hellman private exponents
//! - Nonce salts
//! - Transaction tokens

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Generates `len` cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random string of `len` alphanumeric characters.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a salt for a replay-protection nonce.
///
/// Six alphanumeric characters, enough to separate nonces issued within the
/// same second.
#[must_use]
pub fn nonce_salt() -> String {
    random_alphanumeric(6)
}
