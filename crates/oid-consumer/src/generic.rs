//! The consumer engine.
//!
//! [`GenericConsumer`] negotiates associations with providers and verifies
//! positive assertions. It keeps no per-user state: everything it needs
//! between [`GenericConsumer::begin`] and [`GenericConsumer::complete`]
//! travels in the [`Endpoint`] the caller hands back.
//!
//! Verification of an `id_res` response runs in this order:
//!
//! 1. `user_setup_url` present: setup needed.
//! 2. `return_to`, `identity` and `assoc_handle` must be present.
//! 3. `identity` must equal the endpoint's local identifier.
//! 4. Arguments in the `return_to` query must match the bare arguments.
//! 5. The signature is checked against the stored association, or with the
//!    provider in dumb mode when the handle is unknown.
//! 6. The replay nonce is consumed.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::form_urlencoded;

use oid_crypto::{AssociationType, DhGroup, SessionType};
use oid_store::{Association, AssociationStore, NonceStore};

use crate::auth_request::AuthRequest;
use crate::config::ConsumerConfig;
use crate::endpoint::Endpoint;
use crate::error::{ConsumerError, ConsumerResult};
use crate::fetcher::HttpFetcher;
use crate::message::{Message, Namespace, OPENID_PREFIX};
use crate::nonce::split_nonce;
use crate::response::{Response, SuccessResponse};
use crate::session::ConsumerSession;
use crate::signing::MessageSigning;

/// Fields an `id_res` response cannot do without.
const ID_RES_REQUIRED: [&str; 3] = ["return_to", "identity", "assoc_handle"];

/// Longest association lifetime accepted from a provider: two weeks.
const MAX_ASSOCIATION_LIFETIME: i64 = 14 * 24 * 60 * 60;

/// Provider nonce fields, newest protocol first.
const PROVIDER_NONCE_FIELDS: [&str; 2] = ["response_nonce", "nonce"];

/// Association negotiation and response verification.
pub struct GenericConsumer {
    config: ConsumerConfig,
    associations: Arc<dyn AssociationStore>,
    nonces: Arc<dyn NonceStore>,
    fetcher: Arc<dyn HttpFetcher>,
    dh_group: DhGroup,
}

impl std::fmt::Debug for GenericConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericConsumer")
            .field("config", &self.config)
            .field("dh_group", &self.dh_group)
            .finish_non_exhaustive()
    }
}

impl GenericConsumer {
    /// Creates an engine using the default Diffie-Hellman group.
    #[must_use]
    pub fn new(
        config: ConsumerConfig,
        associations: Arc<dyn AssociationStore>,
        nonces: Arc<dyn NonceStore>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Self {
        Self {
            config,
            associations,
            nonces,
            fetcher,
            dh_group: DhGroup::default(),
        }
    }

    /// Replaces the Diffie-Hellman group offered in associate requests.
    #[must_use]
    pub fn with_dh_group(mut self, group: DhGroup) -> Self {
        self.dh_group = group;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Starts authentication against an endpoint.
    ///
    /// Reuses or negotiates an association when associations are enabled.
    /// Failing to associate is not an error: the request then goes out
    /// without a handle and the response is verified in dumb mode.
    ///
    /// # Errors
    ///
    /// Returns an error only if the association store fails.
    pub async fn begin(&self, endpoint: Endpoint) -> ConsumerResult<AuthRequest> {
        let assoc = if self.config.use_associations {
            self.get_association(&endpoint.server_url).await?
        } else {
            None
        };
        debug!(
            server_url = %endpoint.server_url,
            handle = assoc.as_ref().map(|a| a.handle.as_str()),
            "beginning authentication"
        );
        Ok(AuthRequest::with_nonce_param(
            endpoint,
            assoc,
            &self.config.return_to_nonce_param,
        ))
    }

    /// Returns a usable association for a provider, negotiating a new one
    /// if none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error only if the association store fails. Negotiation
    /// failures yield `Ok(None)`.
    pub async fn get_association(&self, server_url: &str) -> ConsumerResult<Option<Association>> {
        if let Some(assoc) = self.associations.get_association(server_url, None).await? {
            return Ok(Some(assoc));
        }

        let (session, request) = self.create_associate_request();
        let Some(response) = self.make_kv_post(&request, server_url).await else {
            return Ok(None);
        };
        let Some(assoc) = self.parse_association(&response, &session, server_url) else {
            return Ok(None);
        };

        self.associations.store_association(server_url, &assoc).await?;
        info!(
            server_url,
            handle = %assoc.handle,
            assoc_type = %assoc.assoc_type,
            lifetime = assoc.lifetime,
            "association established"
        );
        Ok(Some(assoc))
    }

    /// Builds an associate request and the session that will read its
    /// answer.
    #[must_use]
    pub fn create_associate_request(&self) -> (ConsumerSession, Message) {
        let session = ConsumerSession::new(self.config.session_type, self.dh_group.clone());

        let mut request = Message::new();
        request.set_arg(Namespace::OpenId, "mode", "associate");
        request.set_arg(Namespace::OpenId, "assoc_type", self.config.assoc_type.as_str());
        for (key, value) in session.request_args() {
            request.set_arg(Namespace::OpenId, key, value);
        }
        (session, request)
    }

    /// Turns an associate response into an association.
    ///
    /// Any defect in the response is logged and answered with `None`.
    #[must_use]
    pub fn parse_association(
        &self,
        response: &Message,
        session: &ConsumerSession,
        server_url: &str,
    ) -> Option<Association> {
        match self.read_association(response, session) {
            Ok(assoc) => Some(assoc),
            Err(e) => {
                warn!(server_url, error = %e, "rejected associate response");
                None
            }
        }
    }

    fn read_association(
        &self,
        response: &Message,
        session: &ConsumerSession,
    ) -> ConsumerResult<Association> {
        let assoc_type: AssociationType = response.required_arg("assoc_type")?.parse()?;
        let handle = response.required_arg("assoc_handle")?;
        let expires_in = response.required_arg("expires_in")?;
        let expires_in: i64 = expires_in
            .parse()
            .ok()
            .filter(|secs| *secs >= 0)
            .ok_or_else(|| ConsumerError::Association(format!("bad expires_in: {expires_in}")))?;
        if expires_in > MAX_ASSOCIATION_LIFETIME {
            debug!(handle, expires_in, "capping association lifetime");
        }
        let expires_in = expires_in.min(MAX_ASSOCIATION_LIFETIME);

        let answered: SessionType = response
            .get_arg(Namespace::OpenId, "session_type")
            .unwrap_or_default()
            .parse()?;
        let requested = session.session_type();

        let plaintext = ConsumerSession::Plaintext;
        let session = if answered == requested {
            session
        } else if answered == SessionType::NoEncryption
            && requested.is_diffie_hellman()
            && self.config.allow_plaintext_fallback
        {
            warn!(%requested, "provider answered with a plaintext secret");
            &plaintext
        } else {
            return Err(ConsumerError::Association(format!(
                "requested {requested} session, provider answered {answered}"
            )));
        };

        if !session.session_type().supports(assoc_type) {
            return Err(ConsumerError::Association(format!(
                "{} session cannot carry {assoc_type}",
                session.session_type()
            )));
        }

        let secret = session.extract_secret(response, assoc_type)?;
        Ok(Association::from_expires_in(
            expires_in, handle, secret, assoc_type,
        ))
    }

    /// Posts a message to a provider and parses the key-value answer.
    ///
    /// Transport failures, timeouts, non-2xx statuses and unparseable
    /// bodies are logged and answered with `None`.
    pub async fn make_kv_post(&self, message: &Message, server_url: &str) -> Option<Message> {
        let body = message.to_url_encoded();
        let fetched = tokio::time::timeout(
            self.config.fetch_timeout_duration(),
            self.fetcher.post(server_url, body),
        )
        .await;

        let response = match fetched {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(server_url, error = %e, "direct request failed");
                return None;
            }
            Err(_) => {
                warn!(server_url, timeout = self.config.fetch_timeout, "direct request timed out");
                return None;
            }
        };

        let parsed = Message::from_kv_form(&response.body);
        if !response.is_success() {
            let error = parsed
                .as_ref()
                .ok()
                .and_then(|m| m.get_arg(Namespace::OpenId, "error"))
                .unwrap_or_default();
            warn!(server_url, status = response.status, error, "provider rejected direct request");
            return None;
        }

        match parsed {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(server_url, error = %e, "unreadable provider answer");
                None
            }
        }
    }

    /// Verifies a response the provider sent through the user's browser.
    ///
    /// Protocol-level problems produce [`Response::Failure`]; only store
    /// failures are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the association or nonce store fails.
    pub async fn complete(&self, message: &Message, endpoint: &Endpoint) -> ConsumerResult<Response> {
        let response = match message.get_arg(Namespace::OpenId, "mode") {
            None => Response::failure(endpoint, "no mode set"),
            Some("cancel") => Response::cancel(endpoint),
            Some("error") => Response::failure(
                endpoint,
                message
                    .get_arg(Namespace::OpenId, "error")
                    .unwrap_or("provider reported an error"),
            ),
            Some("id_res") => self.do_id_res(message, endpoint).await?,
            Some(other) => Response::failure(endpoint, format!("invalid openid.mode: {other}")),
        };

        match &response {
            Response::Failure { reason, .. } => {
                warn!(server_url = %endpoint.server_url, reason = %reason, "authentication failed");
            }
            other => info!(
                server_url = %endpoint.server_url,
                claimed_id = other.claimed_id(),
                status = %other.status(),
                "authentication completed"
            ),
        }
        Ok(response)
    }

    async fn do_id_res(&self, message: &Message, endpoint: &Endpoint) -> ConsumerResult<Response> {
        if let Some(setup_url) = message.get_arg(Namespace::OpenId, "user_setup_url") {
            return Ok(Response::setup_needed(endpoint, setup_url));
        }

        if let Some(field) = ID_RES_REQUIRED
            .iter()
            .find(|field| !message.has_key(Namespace::OpenId, field))
        {
            return Ok(Response::failure(
                endpoint,
                ConsumerError::MissingField((*field).to_string()).to_string(),
            ));
        }

        let identity = message.get_arg(Namespace::OpenId, "identity");
        if identity != endpoint.local_identifier() {
            return Ok(Response::failure(
                endpoint,
                format!(
                    "delegate mismatch: expected {}, got {}",
                    endpoint.local_identifier().unwrap_or("nothing"),
                    identity.unwrap_or_default()
                ),
            ));
        }

        if let Err(reason) = verify_return_to_args(message) {
            return Ok(Response::failure(endpoint, reason));
        }

        if let Some(failure) = self.check_signature(message, endpoint).await? {
            return Ok(failure);
        }

        let success = SuccessResponse::from_message(endpoint, message.clone());
        self.check_nonce(&endpoint.server_url, success).await
    }

    /// Answers `Some(failure)` when the signature does not hold.
    async fn check_signature(
        &self,
        message: &Message,
        endpoint: &Endpoint,
    ) -> ConsumerResult<Option<Response>> {
        let server_url = endpoint.server_url.as_str();
        let handle = message
            .get_arg(Namespace::OpenId, "assoc_handle")
            .unwrap_or_default();

        let Some(assoc) = self
            .associations
            .get_association(server_url, Some(handle))
            .await?
        else {
            debug!(server_url, handle, "unknown handle, verifying with the provider");
            return Ok(if self.check_auth(message, server_url).await? {
                None
            } else {
                Some(Response::failure(endpoint, "check_authentication failed"))
            });
        };

        if assoc.is_expired() {
            return Ok(Some(Response::failure(
                endpoint,
                format!("expired association {handle} for {server_url}"),
            )));
        }

        Ok(match assoc.check_message_signature(message) {
            Ok(true) => None,
            Ok(false) => Some(Response::failure(endpoint, "bad signature")),
            Err(e) => Some(Response::failure(endpoint, format!("bad signature: {e}"))),
        })
    }

    /// Asks the provider whether it issued a response (dumb mode).
    ///
    /// # Errors
    ///
    /// Returns an error only if the association store fails while
    /// honouring `invalidate_handle`.
    pub async fn check_auth(&self, message: &Message, server_url: &str) -> ConsumerResult<bool> {
        let Some(request) = Self::create_check_auth_request(message) else {
            return Ok(false);
        };
        let Some(response) = self.make_kv_post(&request, server_url).await else {
            return Ok(false);
        };
        self.process_check_auth_response(&response, server_url).await
    }

    /// Builds a `check_authentication` request from a response: every
    /// OpenID argument, with the mode replaced.
    ///
    /// Answers `None` if a field listed in `openid.signed` is absent.
    #[must_use]
    pub fn create_check_auth_request(message: &Message) -> Option<Message> {
        if let Some(signed) = message.get_arg(Namespace::OpenId, "signed") {
            let missing = signed
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .find(|field| message.get_aliased_arg(field).is_none());
            if let Some(field) = missing {
                warn!(field, "signed field absent, not asking the provider");
                return None;
            }
        }

        let openid_args = message
            .iter()
            .filter(|(key, _)| key.starts_with(OPENID_PREFIX));
        let mut request = match Message::from_post_args(openid_args) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "cannot rebuild response for check_authentication");
                return None;
            }
        };
        request.set_arg(Namespace::OpenId, "mode", "check_authentication");
        Some(request)
    }

    /// Reads a `check_authentication` answer.
    ///
    /// Honours `invalidate_handle` whatever the verdict, then answers
    /// whether `is_valid` is `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the association store fails.
    pub async fn process_check_auth_response(
        &self,
        response: &Message,
        server_url: &str,
    ) -> ConsumerResult<bool> {
        if let Some(handle) = response.get_arg(Namespace::OpenId, "invalidate_handle") {
            let removed = self.associations.remove_association(server_url, handle).await?;
            info!(server_url, handle, removed, "provider invalidated handle");
        }

        match response.get_arg(Namespace::OpenId, "is_valid") {
            Some("true") => Ok(true),
            other => {
                warn!(server_url, is_valid = other, "provider did not confirm signature");
                Ok(false)
            }
        }
    }

    /// Consumes the response's replay nonce.
    ///
    /// The provider's `response_nonce` (or legacy `nonce`) is used when it
    /// is covered by the signature, otherwise the correlator carried in
    /// `return_to`. An unsigned provider nonce is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the nonce store fails.
    pub async fn check_nonce(
        &self,
        server_url: &str,
        response: SuccessResponse,
    ) -> ConsumerResult<Response> {
        let failure = |reason: String| Response::Failure {
            claimed_id: response.claimed_id.clone(),
            reason,
        };

        let provider_nonce = PROVIDER_NONCE_FIELDS
            .into_iter()
            .filter(|field| {
                let signed = response.is_signed(Namespace::OpenId, field);
                if !signed && response.message.has_key(Namespace::OpenId, field) {
                    debug!(server_url, field, "ignoring unsigned provider nonce");
                }
                signed
            })
            .find_map(|field| response.message.get_arg(Namespace::OpenId, field));
        let nonce = match provider_nonce {
            Some(nonce) => nonce.to_string(),
            None => match self.return_to_nonce(&response) {
                Some(nonce) => nonce,
                None => return Ok(failure("Nonce missing from return_to".to_string())),
            },
        };

        let Ok((timestamp, salt)) = split_nonce(&nonce) else {
            return Ok(failure(format!("Malformed nonce: {nonce}")));
        };

        if !self.nonces.consume_nonce(server_url, timestamp, salt).await? {
            return Ok(failure(format!("Nonce missing from store: {nonce}")));
        }
        Ok(Response::Success(response))
    }

    fn return_to_nonce(&self, response: &SuccessResponse) -> Option<String> {
        let return_to = response.return_to()?;
        return_to_query(return_to)
            .into_iter()
            .find(|(key, _)| *key == self.config.return_to_nonce_param)
            .map(|(_, value)| value)
    }
}

/// Query arguments of a `return_to` URL, without the fragment.
fn return_to_query(return_to: &str) -> Vec<(String, String)> {
    let without_fragment = return_to
        .split_once('#')
        .map_or(return_to, |(base, _)| base);
    without_fragment
        .split_once('?')
        .map(|(_, query)| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Every argument in the `return_to` query must come back unchanged as a
/// bare argument.
fn verify_return_to_args(message: &Message) -> Result<(), String> {
    let Some(return_to) = message.get_arg(Namespace::OpenId, "return_to") else {
        return Ok(());
    };
    let bare = message.get_args(Namespace::Bare);
    for (key, expected) in return_to_query(return_to) {
        match bare.get(&key) {
            Some(actual) if *actual == expected => {}
            Some(actual) => {
                return Err(format!(
                    "return_to argument mismatch: {key} is {actual:?}, return_to has {expected:?}"
                ));
            }
            None => {
                return Err(format!("return_to argument mismatch: {key} missing from response"));
            }
        }
    }
    Ok(())
}
