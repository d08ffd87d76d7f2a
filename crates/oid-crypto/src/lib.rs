//! # oid-crypto
//!
//! Cryptographic primitives for the OpenID consumer, built on aws-lc-rs
//! and `num-bigint`.
//!
//! ## Algorithms
//!
//! OpenID associations are fixed to two MAC algorithms:
//! - **HMAC-SHA1** - 20 byte secret, the protocol default
//! - **HMAC-SHA256** - 32 byte secret
//!
//! SHA-1 is only used where the wire protocol demands it and is never
//! offered as a general purpose digest.
//!
//! ## Modules
//!
//! - [`algorithm`] - Association and session type identifiers
//! - [`dh`] - Diffie-Hellman group arithmetic and integer encoding
//! - [`hash`] - Digests, HMAC and constant-time comparison
//! - [`random`] - Secure random bytes and strings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod dh;
pub mod error;
pub mod hash;
pub mod random;

pub use algorithm::{AssociationType, HashAlgorithm, SessionType};
pub use dh::{DiffieHellman, DhGroup};
pub use error::{CryptoError, CryptoResult};
pub use hash::{constant_time_eq, hmac, hmac_sha1, hmac_sha256, hmac_verify, sha1, sha256};
pub use random::{nonce_salt, random_alphanumeric, random_bytes};
