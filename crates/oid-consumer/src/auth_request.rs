//! Authentication requests: the redirect that sends the user to the provider.

use std::fmt::Write as _;

use oid_store::Association;

use crate::endpoint::Endpoint;
use crate::message::OPENID_PREFIX;
use crate::nonce::make_nonce;

/// Name of the `return_to` parameter carrying the local correlator nonce.
pub const DEFAULT_NONCE_PARAM: &str = "nonce";

/// A pending authentication request for one endpoint.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// The endpoint being authenticated against.
    pub endpoint: Endpoint,

    /// The association responses will be signed with, if one was
    /// negotiated. Without one the response is verified in dumb mode.
    pub assoc: Option<Association>,

    /// Arguments appended to `return_to`. Holds the correlator nonce.
    pub return_to_args: Vec<(String, String)>,

    extra_args: Vec<(String, String)>,
}

impl AuthRequest {
    /// Creates a request with a fresh correlator nonce.
    #[must_use]
    pub fn new(endpoint: Endpoint, assoc: Option<Association>) -> Self {
        Self::with_nonce_param(endpoint, assoc, DEFAULT_NONCE_PARAM)
    }

    /// Creates a request whose correlator nonce travels under `nonce_param`.
    #[must_use]
    pub fn with_nonce_param(
        endpoint: Endpoint,
        assoc: Option<Association>,
        nonce_param: &str,
    ) -> Self {
        Self {
            endpoint,
            assoc,
            return_to_args: vec![(nonce_param.to_string(), make_nonce())],
            extra_args: Vec::new(),
        }
    }

    /// Returns the correlator nonce.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.return_to_args.first().map(|(_, nonce)| nonce.as_str())
    }

    /// Adds `openid.<alias>.<key>=<value>` to the request.
    ///
    /// The alias is not checked against any declaration; arguments appear in
    /// the URL in insertion order.
    pub fn add_extension_arg(&mut self, alias: &str, key: &str, value: impl Into<String>) {
        self.extra_args
            .push((format!("{OPENID_PREFIX}{alias}.{key}"), value.into()));
    }

    /// Extension arguments added so far, as raw keys.
    #[must_use]
    pub fn extra_args(&self) -> &[(String, String)] {
        &self.extra_args
    }

    /// Returns `return_to` with the correlator arguments appended.
    #[must_use]
    pub fn return_to_url(&self, return_to: &str) -> String {
        append_args(
            return_to,
            self.return_to_args.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    /// Builds the URL to redirect the user to.
    ///
    /// `immediate` asks the provider to answer without user interaction
    /// (`checkid_immediate`), otherwise `checkid_setup`.
    #[must_use]
    pub fn redirect_url(&self, trust_root: &str, return_to: &str, immediate: bool) -> String {
        let mode = if immediate {
            "checkid_immediate"
        } else {
            "checkid_setup"
        };
        let return_to = self.return_to_url(return_to);

        let mut args: Vec<(&str, &str)> = vec![("openid.mode", mode)];
        if let Some(identity) = self.endpoint.local_identifier() {
            args.push(("openid.identity", identity));
        }
        args.push(("openid.return_to", return_to.as_str()));
        args.push(("openid.trust_root", trust_root));
        if let Some(assoc) = &self.assoc {
            args.push(("openid.assoc_handle", assoc.handle.as_str()));
        }
        args.extend(self.extra_args.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        append_args(&self.endpoint.server_url, args)
    }
}

/// Appends query arguments to a URL that may already have a query. A
/// fragment stays at the end.
fn append_args<'a>(base: &str, args: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let (base, fragment) = match base.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (base, None),
    };
    let mut url = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in args {
        let _ = write!(
            url,
            "{separator}{}={}",
            urlencoding::encode(key),
            urlencoding::encode(value)
        );
        separator = '&';
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}
