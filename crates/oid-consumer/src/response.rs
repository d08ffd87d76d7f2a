//! Authentication outcomes.

use std::collections::BTreeMap;
use std::fmt;

use crate::endpoint::Endpoint;
use crate::message::{Message, Namespace, OPENID_PREFIX};

/// Outcome status, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The assertion verified.
    Success,
    /// The user declined.
    Cancel,
    /// Verification failed or the provider reported an error.
    Failure,
    /// An immediate request needs user interaction.
    SetupNeeded,
}

impl Status {
    /// Returns the status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Cancel => "cancel",
            Self::Failure => "failure",
            Self::SetupNeeded => "setup_needed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of completing an authentication.
///
/// Every variant carries the claimed identifier known when it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The assertion verified.
    Success(SuccessResponse),

    /// The user declined.
    Cancel {
        /// Claimed identifier.
        claimed_id: Option<String>,
    },

    /// Verification failed.
    Failure {
        /// Claimed identifier.
        claimed_id: Option<String>,
        /// Human-readable cause.
        reason: String,
    },

    /// The provider needs the user before it can answer.
    SetupNeeded {
        /// Claimed identifier.
        claimed_id: Option<String>,
        /// Where to send the user.
        setup_url: String,
    },
}

impl Response {
    /// Creates a failure for an endpoint.
    #[must_use]
    pub fn failure(endpoint: &Endpoint, reason: impl Into<String>) -> Self {
        Self::Failure {
            claimed_id: endpoint.claimed_id.clone(),
            reason: reason.into(),
        }
    }

    /// Creates a cancellation for an endpoint.
    #[must_use]
    pub fn cancel(endpoint: &Endpoint) -> Self {
        Self::Cancel {
            claimed_id: endpoint.claimed_id.clone(),
        }
    }

    /// Creates a setup-needed answer for an endpoint.
    #[must_use]
    pub fn setup_needed(endpoint: &Endpoint, setup_url: impl Into<String>) -> Self {
        Self::SetupNeeded {
            claimed_id: endpoint.claimed_id.clone(),
            setup_url: setup_url.into(),
        }
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Success(_) => Status::Success,
            Self::Cancel { .. } => Status::Cancel,
            Self::Failure { .. } => Status::Failure,
            Self::SetupNeeded { .. } => Status::SetupNeeded,
        }
    }

    /// Returns the claimed identifier.
    #[must_use]
    pub fn claimed_id(&self) -> Option<&str> {
        match self {
            Self::Success(success) => success.claimed_id.as_deref(),
            Self::Cancel { claimed_id }
            | Self::Failure { claimed_id, .. }
            | Self::SetupNeeded { claimed_id, .. } => claimed_id.as_deref(),
        }
    }

    /// Returns the failure reason, if this is a failure.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failure { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Returns whether this is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessResponse {
    /// Claimed identifier.
    pub claimed_id: Option<String>,

    /// The provider's message.
    pub message: Message,

    /// Signed fields as raw keys (`openid.return_to`).
    pub signed_fields: Vec<String>,
}

impl SuccessResponse {
    /// Creates a success for an endpoint.
    #[must_use]
    pub fn new(endpoint: &Endpoint, message: Message, signed_fields: Vec<String>) -> Self {
        Self {
            claimed_id: endpoint.claimed_id.clone(),
            message,
            signed_fields,
        }
    }

    /// Creates a success whose signed fields are read from `openid.signed`.
    #[must_use]
    pub fn from_message(endpoint: &Endpoint, message: Message) -> Self {
        let signed_fields = message
            .get_arg(Namespace::OpenId, "signed")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(|field| format!("{OPENID_PREFIX}{field}"))
                    .collect()
            })
            .unwrap_or_default();
        Self::new(endpoint, message, signed_fields)
    }

    /// The verified identity URL.
    #[must_use]
    pub fn identity_url(&self) -> Option<&str> {
        self.claimed_id.as_deref()
    }

    /// The `return_to` URL the provider sent back.
    #[must_use]
    pub fn return_to(&self) -> Option<&str> {
        self.message.get_arg(Namespace::OpenId, "return_to")
    }

    /// Signed fields as raw keys.
    #[must_use]
    pub fn signed_fields(&self) -> &[String] {
        &self.signed_fields
    }

    /// Returns whether a field is covered by the signature.
    #[must_use]
    pub fn is_signed(&self, ns: Namespace<'_>, key: &str) -> bool {
        let raw = match ns {
            Namespace::OpenId => format!("{OPENID_PREFIX}{key}"),
            Namespace::Bare => return false,
            Namespace::Extension(uri) => match self.message.alias_for(uri) {
                Some(alias) => format!("{OPENID_PREFIX}{alias}.{key}"),
                None => return false,
            },
        };
        self.signed_fields.iter().any(|field| *field == raw)
    }

    /// Returns every field of an extension namespace.
    ///
    /// With `require_signed`, answers `None` unless all of them are signed.
    #[must_use]
    pub fn extension_response(
        &self,
        ns_uri: &str,
        require_signed: bool,
    ) -> Option<BTreeMap<String, String>> {
        let ns = Namespace::Extension(ns_uri);
        let args = self.message.get_args(ns);
        if require_signed && !args.keys().all(|key| self.is_signed(ns, key)) {
            return None;
        }
        Some(args)
    }
}
