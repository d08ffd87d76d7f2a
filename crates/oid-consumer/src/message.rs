//! Protocol messages.
//!
//! A [`Message`] is an ordered list of raw `key=value` arguments with a
//! namespace view on top:
//!
//! - `openid.<key>` belongs to the OpenID namespace
//! - `openid.<alias>.<key>` belongs to the extension declared by
//!   `openid.ns.<alias>=<uri>`
//! - keys without the `openid.` prefix form the bare namespace (arguments
//!   the relying party put on its own `return_to`)
//!
//! Raw keys are kept as received so a message parsed from a query string
//! serializes back to the same arguments.

use std::collections::BTreeMap;

use url::form_urlencoded;
use url::Url;

use crate::error::{ConsumerError, ConsumerResult};
use crate::kvform;

/// Prefix of every OpenID protocol argument.
pub const OPENID_PREFIX: &str = "openid.";

/// Simple Registration 1.0, reachable through the undeclared `sreg` alias.
pub const SREG_URI: &str = "http://openid.net/sreg/1.0";

const NS_DECLARATION: &str = "ns";
const SREG_ALIAS: &str = "sreg";

/// The namespace an argument lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace<'a> {
    /// `openid.<key>`.
    OpenId,
    /// Unprefixed keys.
    Bare,
    /// An extension, identified by its URI.
    Extension(&'a str),
}

/// An ordered, namespace-aware set of protocol arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    args: Vec<(String, String)>,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a message from raw arguments as posted by a browser.
    ///
    /// A repeated key keeps its first position and its last value.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidMessage`] when namespace declarations
    /// conflict: one alias bound to two URIs, or one URI bound to two aliases.
    pub fn from_post_args<I, K, V>(pairs: I) -> ConsumerResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut message = Self::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            if let Some(existing) = message.raw(&key) {
                if is_declaration(&key) && existing != value {
                    return Err(ConsumerError::InvalidMessage(format!(
                        "{key} declared as both {existing} and {value}"
                    )));
                }
            }
            message.upsert(key, value);
        }
        message.check_namespaces()?;
        Ok(message)
    }

    /// Builds a message from arguments given without the `openid.` prefix,
    /// as in key-value form bodies.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Message::from_post_args`].
    pub fn from_openid_args<I, K, V>(pairs: I) -> ConsumerResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_post_args(
            pairs
                .into_iter()
                .map(|(k, v)| (format!("{OPENID_PREFIX}{}", k.as_ref()), v)),
        )
    }

    /// Parses an `application/x-www-form-urlencoded` query.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Message::from_post_args`].
    pub fn from_url_encoded(query: &str) -> ConsumerResult<Self> {
        Self::from_post_args(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Parses a key-value form body.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Message::from_post_args`].
    pub fn from_kv_form(text: &str) -> ConsumerResult<Self> {
        Self::from_openid_args(kvform::from_kv(text))
    }

    /// Returns the raw arguments in order.
    #[must_use]
    pub fn to_post_args(&self) -> Vec<(String, String)> {
        self.args.clone()
    }

    /// Iterates over raw arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes the arguments as a query string.
    #[must_use]
    pub fn to_url_encoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.args.iter())
            .finish()
    }

    /// Appends the arguments to `base` as query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not an absolute URL.
    pub fn to_url(&self, base: &str) -> ConsumerResult<String> {
        let mut url = Url::parse(base)
            .map_err(|e| ConsumerError::InvalidMessage(format!("bad base URL {base}: {e}")))?;
        url.query_pairs_mut().extend_pairs(self.args.iter());
        Ok(url.into())
    }

    /// Serializes the OpenID-namespace arguments (prefix stripped) as
    /// key-value form. Bare arguments are not part of direct requests.
    ///
    /// # Errors
    ///
    /// Returns an error if a value contains a newline.
    pub fn to_kv_form(&self) -> ConsumerResult<String> {
        kvform::to_kv(
            self.iter()
                .filter_map(|(k, v)| k.strip_prefix(OPENID_PREFIX).map(|k| (k, v))),
        )
    }

    /// Number of raw arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns whether the message has no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Gets an argument.
    #[must_use]
    pub fn get_arg(&self, ns: Namespace<'_>, key: &str) -> Option<&str> {
        self.raw(&self.raw_key(ns, key)?)
    }

    /// Gets an OpenID-namespace argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::MissingField`] if it is absent.
    pub fn required_arg(&self, key: &str) -> ConsumerResult<&str> {
        self.get_arg(Namespace::OpenId, key)
            .ok_or_else(|| ConsumerError::MissingField(key.to_string()))
    }

    /// Returns whether an argument is present.
    #[must_use]
    pub fn has_key(&self, ns: Namespace<'_>, key: &str) -> bool {
        self.get_arg(ns, key).is_some()
    }

    /// Gets an argument by its name as listed in `openid.signed`: either a
    /// plain OpenID key (`return_to`) or `alias.key` (`sreg.nickname`).
    #[must_use]
    pub fn get_aliased_arg(&self, aliased_key: &str) -> Option<&str> {
        self.raw(&format!("{OPENID_PREFIX}{aliased_key}"))
    }

    /// Returns every argument of one namespace, keyed by local name.
    #[must_use]
    pub fn get_args(&self, ns: Namespace<'_>) -> BTreeMap<String, String> {
        self.args
            .iter()
            .filter_map(|(raw, value)| match self.resolve(raw) {
                Some((arg_ns, key)) if arg_ns == ns => Some((key.to_string(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Sets an argument, replacing any previous value in place.
    ///
    /// Setting an argument in an undeclared extension namespace declares it
    /// under a fresh `extN` alias.
    pub fn set_arg(&mut self, ns: Namespace<'_>, key: &str, value: impl Into<String>) {
        let raw = match ns {
            Namespace::Extension(uri) => {
                let existing = self.alias_for(uri).map(str::to_string);
                let alias = match existing {
                    Some(alias) => alias,
                    None => self.declare_fresh_alias(uri),
                };
                format!("{OPENID_PREFIX}{alias}.{key}")
            }
            Namespace::OpenId => format!("{OPENID_PREFIX}{key}"),
            Namespace::Bare => key.to_string(),
        };
        self.upsert(raw, value.into());
    }

    /// Removes an argument, returning its value.
    pub fn del_arg(&mut self, ns: Namespace<'_>, key: &str) -> Option<String> {
        let raw = self.raw_key(ns, key)?;
        let index = self.args.iter().position(|(k, _)| *k == raw)?;
        Some(self.args.remove(index).1)
    }

    /// Declares an extension namespace alias.
    ///
    /// # Errors
    ///
    /// Returns an error if the alias or the URI is already bound to
    /// something else.
    pub fn declare_namespace(&mut self, alias: &str, uri: &str) -> ConsumerResult<()> {
        if let Some(existing) = self.namespace_uri(alias) {
            if existing == uri {
                return Ok(());
            }
            return Err(ConsumerError::InvalidMessage(format!(
                "alias {alias} already bound to {existing}"
            )));
        }
        if let Some(existing) = self.declared_alias(uri) {
            return Err(ConsumerError::InvalidMessage(format!(
                "{uri} already bound to alias {existing}"
            )));
        }
        self.upsert(
            format!("{OPENID_PREFIX}{NS_DECLARATION}.{alias}"),
            uri.to_string(),
        );
        Ok(())
    }

    /// Returns the URI an alias is declared for.
    #[must_use]
    pub fn namespace_uri(&self, alias: &str) -> Option<&str> {
        self.raw(&format!("{OPENID_PREFIX}{NS_DECLARATION}.{alias}"))
    }

    /// Returns the alias under which an extension URI is reachable.
    #[must_use]
    pub fn alias_for(&self, uri: &str) -> Option<&str> {
        self.declared_alias(uri).or_else(|| {
            (uri == SREG_URI && self.namespace_uri(SREG_ALIAS).is_none()).then_some(SREG_ALIAS)
        })
    }

    fn declared_alias(&self, uri: &str) -> Option<&str> {
        self.declarations()
            .find(|(_, declared)| *declared == uri)
            .map(|(alias, _)| alias)
    }

    fn declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(raw, uri)| {
            raw.strip_prefix(OPENID_PREFIX)
                .and_then(|k| k.strip_prefix(NS_DECLARATION))
                .and_then(|k| k.strip_prefix('.'))
                .map(|alias| (alias, uri))
        })
    }

    fn declare_fresh_alias(&mut self, uri: &str) -> String {
        let alias = (0..)
            .map(|n| format!("ext{n}"))
            .find(|alias| self.namespace_uri(alias).is_none())
            .unwrap_or_else(|| unreachable!("alias space is unbounded"));
        self.upsert(
            format!("{OPENID_PREFIX}{NS_DECLARATION}.{alias}"),
            uri.to_string(),
        );
        alias
    }

    fn check_namespaces(&self) -> ConsumerResult<()> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (alias, uri) in self.declarations() {
            if alias.is_empty() || alias.contains('.') {
                return Err(ConsumerError::InvalidMessage(format!(
                    "invalid namespace alias {alias:?}"
                )));
            }
            if let Some(other) = seen.insert(uri, alias) {
                return Err(ConsumerError::InvalidMessage(format!(
                    "{uri} bound to both {other} and {alias}"
                )));
            }
        }
        Ok(())
    }

    /// Maps a namespace and local key to the raw argument name.
    fn raw_key(&self, ns: Namespace<'_>, key: &str) -> Option<String> {
        match ns {
            Namespace::OpenId => Some(format!("{OPENID_PREFIX}{key}")),
            Namespace::Bare => Some(key.to_string()),
            Namespace::Extension(uri) => self
                .alias_for(uri)
                .map(|alias| format!("{OPENID_PREFIX}{alias}.{key}")),
        }
    }

    /// Maps a raw argument name to its namespace and local key. Namespace
    /// declarations belong to no namespace.
    fn resolve<'m>(&'m self, raw: &'m str) -> Option<(Namespace<'m>, &'m str)> {
        let Some(rest) = raw.strip_prefix(OPENID_PREFIX) else {
            return Some((Namespace::Bare, raw));
        };
        let Some((alias, key)) = rest.split_once('.') else {
            return Some((Namespace::OpenId, rest));
        };
        if alias == NS_DECLARATION {
            return None;
        }
        match self.namespace_uri(alias) {
            Some(uri) => Some((Namespace::Extension(uri), key)),
            None if alias == SREG_ALIAS => Some((Namespace::Extension(SREG_URI), key)),
            None => Some((Namespace::OpenId, rest)),
        }
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn upsert(&mut self, key: String, value: String) {
        match self.args.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.args.push((key, value)),
        }
    }
}

fn is_declaration(raw: &str) -> bool {
    raw.strip_prefix(OPENID_PREFIX)
        .is_some_and(|k| k.starts_with("ns."))
}
