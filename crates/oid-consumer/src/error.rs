//! Consumer error types.
//!
//! Verification outcomes are not errors: a rejected assertion is a
//! [`Response::Failure`](crate::Response::Failure). These types cover
//! malformed input at API boundaries and collaborator faults.

use thiserror::Error;

use oid_crypto::CryptoError;
use oid_store::StoreError;

/// Consumer errors.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Message arguments are inconsistent (e.g. conflicting namespace aliases).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Key-value form could not be produced.
    #[error("invalid kv form: {0}")]
    KvForm(String),

    /// Nonce does not have the `TIMESTAMP+SALT` form.
    #[error("malformed nonce: {0}")]
    MalformedNonce(String),

    /// A required protocol field is absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// An associate response could not be turned into an association.
    #[error("association rejected: {0}")]
    Association(String),

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(String),

    /// An HTTP round trip exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Discovery produced no usable endpoint.
    #[error("no OpenID endpoint found for {0}")]
    NoEndpoint(String),

    /// Discovery collaborator failure.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Session state could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ConsumerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;
