//! Store error types.

use thiserror::Error;

/// Store operation errors.
///
/// These are faults of the storage backend, not protocol outcomes: the
/// engine propagates them to its caller unchanged. The in-memory stores
/// never fail; shared backends report through these variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("store operation timed out")]
    Timeout,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
