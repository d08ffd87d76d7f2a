//! Session-aware consumer facade.
//!
//! [`Consumer`] wraps a [`GenericConsumer`] with per-user state kept in a
//! [`SessionStore`]: the endpoint an authentication was started against,
//! and the discovered endpoints not tried yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use oid_store::SessionStore;

use crate::auth_request::AuthRequest;
use crate::discovery::Discovery;
use crate::endpoint::Endpoint;
use crate::error::{ConsumerError, ConsumerResult};
use crate::generic::GenericConsumer;
use crate::message::Message;
use crate::response::{Response, Status};

/// Session key suffix for the endpoint of the pending authentication.
const TOKEN_KEY: &str = "last_token";

/// Session key suffix for the discovered endpoints left to try.
const DISCOVERY_KEY: &str = "discovery";

#[derive(Debug, Serialize, Deserialize)]
struct DiscoveryState {
    identifier: String,
    endpoints: Vec<Endpoint>,
}

/// High-level consumer for one user session.
pub struct Consumer {
    engine: GenericConsumer,
    session: Arc<dyn SessionStore>,
    discovery: Arc<dyn Discovery>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    /// Creates a facade over `engine`.
    #[must_use]
    pub fn new(
        engine: GenericConsumer,
        session: Arc<dyn SessionStore>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        Self {
            engine,
            session,
            discovery,
        }
    }

    /// Returns the underlying engine.
    #[must_use]
    pub const fn engine(&self) -> &GenericConsumer {
        &self.engine
    }

    fn token_key(&self) -> String {
        format!("{}{TOKEN_KEY}", self.engine.config().session_key_prefix)
    }

    fn discovery_key(&self) -> String {
        format!("{}{DISCOVERY_KEY}", self.engine.config().session_key_prefix)
    }

    /// Starts authentication for a user-supplied identifier.
    ///
    /// Endpoints left over from an earlier attempt with the same identifier
    /// are tried before discovering again.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::NoEndpoint`] if discovery finds nothing, or
    /// an error from discovery or the stores.
    pub async fn begin(&self, identifier: &str) -> ConsumerResult<AuthRequest> {
        let discovery_key = self.discovery_key();

        let stored = match self.session.get(&discovery_key).await? {
            Some(json) => serde_json::from_str::<DiscoveryState>(&json)
                .map_err(|e| warn!(error = %e, "discarding unreadable discovery state"))
                .ok(),
            None => None,
        };

        let mut state = match stored {
            Some(state) if state.identifier == identifier && !state.endpoints.is_empty() => {
                debug!(identifier, remaining = state.endpoints.len(), "trying next endpoint");
                state
            }
            _ => {
                let endpoints = self.discovery.discover(identifier).await?;
                debug!(identifier, found = endpoints.len(), "discovered endpoints");
                DiscoveryState {
                    identifier: identifier.to_string(),
                    endpoints,
                }
            }
        };

        if state.endpoints.is_empty() {
            self.session.delete(&discovery_key).await?;
            return Err(ConsumerError::NoEndpoint(identifier.to_string()));
        }

        let endpoint = state.endpoints.remove(0);
        self.session
            .set(&discovery_key, serde_json::to_string(&state)?)
            .await?;
        self.begin_without_discovery(endpoint).await
    }

    /// Starts authentication against a known endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails.
    pub async fn begin_without_discovery(&self, endpoint: Endpoint) -> ConsumerResult<AuthRequest> {
        let token = serde_json::to_string(&endpoint)?;
        let request = self.engine.begin(endpoint).await?;
        self.session.set(&self.token_key(), token).await?;
        Ok(request)
    }

    /// Completes the pending authentication with the query the provider
    /// sent back.
    ///
    /// The pending endpoint is removed from the session whatever the
    /// outcome. Success and cancellation also drop the remaining discovered
    /// endpoints; failure keeps them so [`Consumer::begin`] can move on to
    /// the next one.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails.
    pub async fn complete<I, K, V>(&self, query: I) -> ConsumerResult<Response>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let message = Message::from_post_args(query);

        let token_key = self.token_key();
        let token = self.session.get(&token_key).await?;
        self.session.delete(&token_key).await?;

        let endpoint = token.and_then(|json| {
            serde_json::from_str::<Endpoint>(&json)
                .map_err(|e| warn!(error = %e, "discarding unreadable endpoint token"))
                .ok()
        });
        let Some(endpoint) = endpoint else {
            warn!("no pending authentication in session");
            return Ok(Response::Failure {
                claimed_id: None,
                reason: "no session state found".to_string(),
            });
        };

        let response = match message {
            Ok(message) => self.engine.complete(&message, &endpoint).await?,
            Err(e) => Response::failure(&endpoint, e.to_string()),
        };

        if matches!(response.status(), Status::Success | Status::Cancel) {
            self.session.delete(&self.discovery_key()).await?;
        }
        Ok(response)
    }
}
