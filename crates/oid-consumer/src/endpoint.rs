//! Provider endpoints selected by discovery.

use serde::{Deserialize, Serialize};

/// A provider endpoint for one claimed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// The identifier the user claims.
    pub claimed_id: Option<String>,

    /// The provider's OpenID server URL.
    pub server_url: String,

    /// The identifier the provider manages, when it differs from the
    /// claimed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
}

impl Endpoint {
    /// Creates an endpoint with no delegate identifier.
    #[must_use]
    pub fn new(claimed_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            claimed_id: Some(claimed_id.into()),
            server_url: server_url.into(),
            local_id: None,
        }
    }

    /// Sets the delegate identifier.
    #[must_use]
    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = Some(local_id.into());
        self
    }

    /// The identifier sent to and expected back from the provider: the
    /// delegate if there is one, else the claimed identifier.
    #[must_use]
    pub fn local_identifier(&self) -> Option<&str> {
        self.local_id.as_deref().or(self.claimed_id.as_deref())
    }
}
