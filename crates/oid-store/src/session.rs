//! Web session storage.
//!
//! Holds in-flight transaction state (the chosen endpoint, discovery
//! progress) between the redirect to the provider and the return.

use async_trait::async_trait;

use crate::error::StoreResult;

/// Key/value session bound to one user agent.
///
/// The caller chooses the medium (cookie-backed, server-side, ...); the
/// consumer only needs these three operations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Gets a value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Sets a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;

    /// Deletes a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
