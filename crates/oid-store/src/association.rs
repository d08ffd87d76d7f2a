//! Associations and their store.
//!
//! An association is a MAC secret shared with one provider. Records are
//! immutable: an invalidated association is removed, never edited.

use async_trait::async_trait;
use chrono::Utc;
use oid_crypto::{hmac, hmac_verify, AssociationType};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A shared secret negotiated with a provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Opaque handle chosen by the provider.
    pub handle: String,

    /// MAC secret.
    pub secret: Vec<u8>,

    /// Issue time (Unix epoch seconds).
    pub issued: i64,

    /// Lifetime in seconds, counted from `issued`.
    pub lifetime: i64,

    /// MAC algorithm.
    pub assoc_type: AssociationType,
}

impl std::fmt::Debug for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("secret", &"<redacted>")
            .field("issued", &self.issued)
            .field("lifetime", &self.lifetime)
            .field("assoc_type", &self.assoc_type)
            .finish()
    }
}

impl Association {
    /// Creates an association record.
    #[must_use]
    pub fn new(
        handle: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        issued: i64,
        lifetime: i64,
        assoc_type: AssociationType,
    ) -> Self {
        Self {
            handle: handle.into(),
            secret: secret.into(),
            issued,
            lifetime,
            assoc_type,
        }
    }

    /// Creates an association issued now that expires in `expires_in`
    /// seconds, as reported by an associate response.
    #[must_use]
    pub fn from_expires_in(
        expires_in: i64,
        handle: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        assoc_type: AssociationType,
    ) -> Self {
        Self::new(handle, secret, Utc::now().timestamp(), expires_in, assoc_type)
    }

    /// Seconds until expiry at `now`, never negative.
    #[must_use]
    pub fn expires_in_at(&self, now: i64) -> i64 {
        self.issued
            .saturating_add(self.lifetime)
            .saturating_sub(now)
            .max(0)
    }

    /// Seconds until expiry, never negative. Zero means expired.
    #[must_use]
    pub fn expires_in(&self) -> i64 {
        self.expires_in_at(Utc::now().timestamp())
    }

    /// Returns whether the association can no longer be used.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_in() == 0
    }

    /// Computes the MAC of `data` under this association's secret.
    #[must_use]
    pub fn mac(&self, data: &[u8]) -> Vec<u8> {
        hmac(self.assoc_type.hash_algorithm(), &self.secret, data)
    }

    /// Verifies a MAC in constant time.
    #[must_use]
    pub fn verify_mac(&self, data: &[u8], tag: &[u8]) -> bool {
        hmac_verify(self.assoc_type.hash_algorithm(), &self.secret, data, tag)
    }
}

/// Association storage, keyed by provider endpoint URL.
///
/// Several handles may coexist for one provider.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Stores an association. An existing record with the same handle for
    /// the same provider is replaced.
    async fn store_association(&self, server_url: &str, association: &Association)
    -> StoreResult<()>;

    /// Gets an association.
    ///
    /// With a handle, returns that association even if it has expired.
    /// Without one, returns the unexpired association issued most recently.
    async fn get_association(
        &self,
        server_url: &str,
        handle: Option<&str>,
    ) -> StoreResult<Option<Association>>;

    /// Removes an association. Returns whether one was removed.
    async fn remove_association(&self, server_url: &str, handle: &str) -> StoreResult<bool>;

    /// Removes expired associations. Returns how many were removed.
    async fn cleanup_associations(&self) -> StoreResult<u64>;
}
