//! Identifier discovery.
//!
//! Resolving a user-supplied identifier to provider endpoints (Yadis, HTML
//! link tags) happens outside this crate. The [`Consumer`](crate::Consumer)
//! facade only needs the resulting endpoint list, in preference order.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::endpoint::Endpoint;
use crate::error::ConsumerResult;

/// Resolves identifiers to provider endpoints.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Returns the endpoints for `identifier`, most preferred first.
    ///
    /// An identifier without endpoints yields an empty list, not an error.
    async fn discover(&self, identifier: &str) -> ConsumerResult<Vec<Endpoint>>;
}

/// Discovery from a fixed table.
///
/// Useful when endpoints are configured rather than discovered.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    endpoints: RwLock<HashMap<String, Vec<Endpoint>>>,
}

impl StaticDiscovery {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoints returned for `identifier`.
    pub fn insert(&self, identifier: impl Into<String>, endpoints: Vec<Endpoint>) {
        self.endpoints.write().insert(identifier.into(), endpoints);
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self, identifier: &str) -> ConsumerResult<Vec<Endpoint>> {
        Ok(self
            .endpoints
            .read()
            .get(identifier)
            .cloned()
            .unwrap_or_default())
    }
}
