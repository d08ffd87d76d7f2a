//! Cryptographic error types.

use thiserror::Error;

/// Errors raised by the primitives in this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Unknown association type name.
    #[error("unknown association type: {0}")]
    UnknownAssociationType(String),

    /// Unknown session type name.
    #[error("unknown session type: {0}")]
    UnknownSessionType(String),

    /// Integer could not be decoded.
    #[error("invalid integer encoding: {0}")]
    InvalidInteger(String),

    /// Public value outside the group.
    #[error("public value out of range")]
    PublicValueOutOfRange,

    /// Byte strings that must line up did not.
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
