//! In-memory store implementations.
//!
//! Suitable for single-instance deployments and testing. Each operation
//! takes one lock for its whole read-modify-write, which is what makes
//! nonce consumption atomic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::association::{Association, AssociationStore};
use crate::error::StoreResult;
use crate::nonce::NonceStore;
use crate::session::SessionStore;

/// Default accepted distance between a nonce timestamp and now: 5 hours.
pub const DEFAULT_NONCE_SKEW_SECS: i64 = 5 * 60 * 60;

// ============================================================================
// Associations
// ============================================================================

/// In-memory association store.
#[derive(Debug, Default)]
pub struct MemoryAssociationStore {
    associations: RwLock<HashMap<String, Vec<Association>>>,
}

impl MemoryAssociationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of associations held for a provider.
    #[must_use]
    pub fn count(&self, server_url: &str) -> usize {
        self.associations
            .read()
            .get(server_url)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> StoreResult<()> {
        let mut associations = self.associations.write();
        let entries = associations.entry(server_url.to_string()).or_default();
        match entries.iter_mut().find(|a| a.handle == association.handle) {
            Some(existing) => *existing = association.clone(),
            None => entries.push(association.clone()),
        }
        Ok(())
    }

    async fn get_association(
        &self,
        server_url: &str,
        handle: Option<&str>,
    ) -> StoreResult<Option<Association>> {
        let associations = self.associations.read();
        let Some(entries) = associations.get(server_url) else {
            return Ok(None);
        };

        let found = match handle {
            Some(handle) => entries.iter().find(|a| a.handle == handle),
            None => {
                let now = Utc::now().timestamp();
                entries
                    .iter()
                    .filter(|a| a.expires_in_at(now) > 0)
                    .max_by_key(|a| a.issued)
            }
        };
        Ok(found.cloned())
    }

    async fn remove_association(&self, server_url: &str, handle: &str) -> StoreResult<bool> {
        let mut associations = self.associations.write();
        let Some(entries) = associations.get_mut(server_url) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|a| a.handle != handle);
        let removed = entries.len() < before;
        if entries.is_empty() {
            associations.remove(server_url);
        }
        Ok(removed)
    }

    async fn cleanup_associations(&self) -> StoreResult<u64> {
        let now = Utc::now().timestamp();
        let mut associations = self.associations.write();
        let mut removed = 0u64;
        for entries in associations.values_mut() {
            let before = entries.len();
            entries.retain(|a| a.expires_in_at(now) > 0);
            removed += (before - entries.len()) as u64;
        }
        associations.retain(|_, entries| !entries.is_empty());
        tracing::debug!(removed, "expired associations cleaned up");
        Ok(removed)
    }
}

// ============================================================================
// Nonces
// ============================================================================

/// In-memory nonce store.
///
/// Rejects nonces whose timestamp is further than the skew window from now,
/// so the set of remembered nonces stays bounded after [`cleanup_nonces`].
///
/// [`cleanup_nonces`]: NonceStore::cleanup_nonces
#[derive(Debug)]
pub struct MemoryNonceStore {
    seen: Mutex<HashSet<(String, i64, String)>>,
    skew_secs: i64,
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::with_skew(DEFAULT_NONCE_SKEW_SECS)
    }
}

impl MemoryNonceStore {
    /// Creates a store with the default skew window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store accepting timestamps within `skew_secs` of now.
    #[must_use]
    pub fn with_skew(skew_secs: i64) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            skew_secs,
        }
    }

    /// Returns the number of remembered nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Returns whether no nonce is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn consume_nonce(
        &self,
        server_url: &str,
        timestamp: i64,
        salt: &str,
    ) -> StoreResult<bool> {
        let now = Utc::now().timestamp();
        if (now - timestamp).abs() > self.skew_secs {
            tracing::debug!(server_url, timestamp, "nonce outside skew window");
            return Ok(false);
        }

        let fresh = self
            .seen
            .lock()
            .insert((server_url.to_string(), timestamp, salt.to_string()));
        Ok(fresh)
    }

    async fn cleanup_nonces(&self) -> StoreResult<u64> {
        let now = Utc::now().timestamp();
        let mut seen = self.seen.lock();
        let before = seen.len();
        seen.retain(|(_, timestamp, _)| (now - timestamp).abs() <= self.skew_secs);
        Ok((before - seen.len()) as u64)
    }
}

// ============================================================================
// Session
// ============================================================================

/// In-memory session.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the session holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Returns whether `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
