//! Nonce store.
//!
//! Replay protection for positive assertions.

use async_trait::async_trait;

use crate::error::StoreResult;

/// Single-use nonce tracking, keyed by provider.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Consumes a nonce.
    ///
    /// Returns `true` if the `(server_url, timestamp, salt)` triple was
    /// fresh and is now marked as seen, `false` if it was already seen or
    /// is not acceptable to this store (e.g. outside its time window).
    ///
    /// Must be linearizable per triple: of any number of concurrent calls
    /// with the same triple, at most one returns `true`.
    async fn consume_nonce(&self, server_url: &str, timestamp: i64, salt: &str)
    -> StoreResult<bool>;

    /// Drops nonces that can no longer be accepted. Returns how many were
    /// removed.
    async fn cleanup_nonces(&self) -> StoreResult<u64>;
}
