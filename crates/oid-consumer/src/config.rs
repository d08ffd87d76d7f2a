//! Consumer configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use oid_crypto::{AssociationType, SessionType};

use crate::auth_request::DEFAULT_NONCE_PARAM;
use crate::error::{ConsumerError, ConsumerResult};

/// Consumer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Session type requested when associating.
    pub session_type: SessionType,

    /// Association type requested when associating.
    pub assoc_type: AssociationType,

    /// Negotiate associations. When off, every response is verified in
    /// dumb mode.
    pub use_associations: bool,

    /// Accept a plaintext associate response to a Diffie-Hellman request.
    pub allow_plaintext_fallback: bool,

    /// Timeout for each direct request, in seconds.
    pub fetch_timeout: u64,

    /// Prefix of every session key the consumer writes.
    pub session_key_prefix: String,

    /// `return_to` parameter carrying the correlator nonce.
    pub return_to_nonce_param: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            session_type: SessionType::DhSha1,
            assoc_type: AssociationType::HmacSha1,
            use_associations: true,
            allow_plaintext_fallback: false,
            fetch_timeout: 30,
            session_key_prefix: "_openid_consumer_".to_string(),
            return_to_nonce_param: DEFAULT_NONCE_PARAM.to_string(),
        }
    }
}

impl ConsumerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown session or association type, or an
    /// invalid combination of the two.
    pub fn from_env() -> ConsumerResult<Self> {
        let defaults = Self::default();

        let session_type = match std::env::var("OPENID_SESSION_TYPE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.session_type,
        };

        let assoc_type = match std::env::var("OPENID_ASSOC_TYPE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.assoc_type,
        };

        let use_associations = std::env::var("OPENID_USE_ASSOCIATIONS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(defaults.use_associations);

        let allow_plaintext_fallback = std::env::var("OPENID_ALLOW_PLAINTEXT_FALLBACK")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(defaults.allow_plaintext_fallback);

        let fetch_timeout = std::env::var("OPENID_FETCH_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.fetch_timeout);

        let session_key_prefix = std::env::var("OPENID_SESSION_KEY_PREFIX")
            .unwrap_or(defaults.session_key_prefix);

        let return_to_nonce_param = std::env::var("OPENID_RETURN_TO_NONCE_PARAM")
            .unwrap_or(defaults.return_to_nonce_param);

        let config = Self {
            session_type,
            assoc_type,
            use_associations,
            allow_plaintext_fallback,
            fetch_timeout,
            session_key_prefix,
            return_to_nonce_param,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the session type can carry the association type.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Config`] for a mismatched pair or an empty
    /// nonce parameter name.
    pub fn validate(&self) -> ConsumerResult<()> {
        if !self.session_type.supports(self.assoc_type) {
            return Err(ConsumerError::Config(format!(
                "{} cannot carry {} secrets",
                self.session_type, self.assoc_type
            )));
        }
        if self.return_to_nonce_param.is_empty() {
            return Err(ConsumerError::Config(
                "return_to nonce parameter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the direct request timeout.
    #[must_use]
    pub const fn fetch_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}
