//! Digests and keyed hashes.
//!
//! SHA-1 appears here only because the OpenID association protocol
//! requires it for HMAC-SHA1 and DH-SHA1.

use aws_lc_rs::{constant_time, digest, hmac as aws_hmac};

use crate::algorithm::HashAlgorithm;

/// Computes a digest of the input data.
#[must_use]
pub fn hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        HashAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        HashAlgorithm::Sha256 => &digest::SHA256,
    };

    digest::digest(alg, data).as_ref().to_vec()
}

/// Computes a SHA-1 digest.
#[must_use]
pub fn sha1(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha1, data)
}

/// Computes a SHA-256 digest.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha256, data)
}

fn hmac_key(algorithm: HashAlgorithm, key: &[u8]) -> aws_hmac::Key {
    let alg = match algorithm {
        HashAlgorithm::Sha1 => aws_hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        HashAlgorithm::Sha256 => aws_hmac::HMAC_SHA256,
    };
    aws_hmac::Key::new(alg, key)
}

/// Computes an HMAC tag over `data`.
#[must_use]
pub fn hmac(algorithm: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac_key(algorithm, key);
    aws_hmac::sign(&key, data).as_ref().to_vec()
}

/// Computes an HMAC-SHA1 tag.
#[must_use]
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    hmac(HashAlgorithm::Sha1, key, data)
}

/// Computes an HMAC-SHA256 tag.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    hmac(HashAlgorithm::Sha256, key, data)
}

/// Verifies an HMAC tag in constant time.
#[must_use]
pub fn hmac_verify(algorithm: HashAlgorithm, key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let key = hmac_key(algorithm, key);
    aws_hmac::verify(&key, data, tag).is_ok()
}

/// Compares two byte strings without leaking where they differ.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    #[allow(deprecated)]
    constant_time::verify_slices_are_equal(a, b).is_ok()
}
