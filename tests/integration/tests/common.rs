//! Common test utilities and fixtures.
//!
//! [`FakeProvider`] plays the OpenID provider in-process: it answers the
//! relying party's direct requests through [`HttpFetcher`] and produces the
//! responses a browser would carry back after the user approves.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use num_bigint::BigUint;
use parking_lot::Mutex;
use url::Url;

use oid_consumer::message::SREG_URI;
use oid_consumer::{
    kvform, ConsumerConfig, ConsumerError, ConsumerResult, GenericConsumer, HttpFetcher,
    HttpResponse, Message, MessageSigning, Namespace,
};
use oid_crypto::dh::{from_base64, to_base64};
use oid_crypto::{random_bytes, AssociationType, DhGroup, DiffieHellman, HashAlgorithm};
use oid_store::{Association, MemoryAssociationStore, MemoryNonceStore};

/// The provider's OpenID server URL.
pub const OP_URL: &str = "http://op.example/server";

/// Where the relying party receives responses.
pub const RETURN_TO: &str = "http://rp.example/finish";

/// The relying party's trust root.
pub const TRUST_ROOT: &str = "http://rp.example/";

/// Claimed identifier used throughout.
pub const CLAIMED_ID: &str = "http://jane.example/";

/// Initializes tracing once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("oid_consumer=debug,oid_store=debug")
        .with_test_writer()
        .try_init();
}

/// A small group so DH tests run fast.
pub fn weak_group() -> DhGroup {
    DhGroup::new(BigUint::from(1_235_514_290_909_u64), BigUint::from(2u8))
}

/// How the provider answers associate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociateMode {
    /// Honour the requested session type.
    Honour,
    /// Always send the secret in the clear.
    Plaintext,
    /// Refuse to associate.
    Refuse,
}

/// In-process OpenID provider.
pub struct FakeProvider {
    mode: AssociateMode,
    shared: Mutex<HashMap<String, Association>>,
    private: Association,
    associate_requests: AtomicUsize,
    check_auth_requests: AtomicUsize,
}

impl FakeProvider {
    pub fn new(mode: AssociateMode) -> Self {
        Self {
            mode,
            shared: Mutex::new(HashMap::new()),
            private: Association::new(
                "private-handle",
                random_bytes(20),
                chrono::Utc::now().timestamp(),
                3600,
                AssociationType::HmacSha1,
            ),
            associate_requests: AtomicUsize::new(0),
            check_auth_requests: AtomicUsize::new(0),
        }
    }

    pub fn associate_requests(&self) -> usize {
        self.associate_requests.load(Ordering::SeqCst)
    }

    pub fn check_auth_requests(&self) -> usize {
        self.check_auth_requests.load(Ordering::SeqCst)
    }

    /// Drops every shared association, as a provider restart would.
    pub fn forget_associations(&self) {
        self.shared.lock().clear();
    }

    /// Answers an authentication request as if the user approved it, and
    /// returns the query the browser brings back to `return_to`.
    ///
    /// The response is signed with the association the request named when
    /// the provider still knows it, otherwise with a private association
    /// (and the unknown handle is invalidated).
    pub fn approve(&self, redirect_url: &str) -> anyhow::Result<Vec<(String, String)>> {
        let request = query_message(redirect_url)?;
        let return_to = request.required_arg("return_to")?.to_string();

        let mut response = Message::new();
        response.set_arg(Namespace::OpenId, "mode", "id_res");
        response.set_arg(Namespace::OpenId, "identity", request.required_arg("identity")?);
        response.set_arg(Namespace::OpenId, "return_to", return_to.as_str());
        response.set_arg(Namespace::Extension(SREG_URI), "nickname", "jane");

        let requested = request.get_arg(Namespace::OpenId, "assoc_handle");
        let shared = requested.and_then(|handle| self.shared.lock().get(handle).cloned());
        let signer = match shared {
            Some(assoc) => assoc,
            None => {
                if let Some(handle) = requested {
                    response.set_arg(Namespace::OpenId, "invalidate_handle", handle);
                }
                self.private.clone()
            }
        };

        let signed = signer.sign_message(&response)?;
        browser_return(&return_to, &signed)
    }

    /// Answers a `checkid_immediate` request that needs the user.
    pub fn needs_setup(&self, redirect_url: &str) -> anyhow::Result<Vec<(String, String)>> {
        let request = query_message(redirect_url)?;
        let return_to = request.required_arg("return_to")?.to_string();

        let mut response = Message::new();
        response.set_arg(Namespace::OpenId, "mode", "id_res");
        response.set_arg(Namespace::OpenId, "user_setup_url", format!("{OP_URL}/setup"));
        browser_return(&return_to, &response)
    }

    fn associate(&self, request: &Message) -> ConsumerResult<HttpResponse> {
        let n = self.associate_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.mode == AssociateMode::Refuse {
            return Ok(HttpResponse::new(OP_URL, 400, "error:association refused\n"));
        }

        let assoc = Association::new(
            format!("handle-{n}"),
            random_bytes(20),
            chrono::Utc::now().timestamp(),
            600,
            AssociationType::HmacSha1,
        );
        let mut fields = vec![
            ("assoc_type", "HMAC-SHA1".to_string()),
            ("assoc_handle", assoc.handle.clone()),
            ("expires_in", "600".to_string()),
        ];

        let session_type = request.get_arg(Namespace::OpenId, "session_type");
        if self.mode == AssociateMode::Honour && session_type == Some("DH-SHA1") {
            let group = DhGroup::new(
                from_base64(request.required_arg("dh_modulus")?)?,
                from_base64(request.required_arg("dh_gen")?)?,
            );
            let consumer_public = from_base64(request.required_arg("dh_consumer_public")?)?;
            let dh = DiffieHellman::new(group);
            let masked = dh.xor_secret(&consumer_public, &assoc.secret, HashAlgorithm::Sha1)?;
            fields.push(("session_type", "DH-SHA1".to_string()));
            fields.push(("dh_server_public", to_base64(&dh.public_key())));
            fields.push(("enc_mac_key", b64(&masked)));
        } else {
            fields.push(("mac_key", b64(&assoc.secret)));
        }

        self.shared.lock().insert(assoc.handle.clone(), assoc);
        let body = kvform::to_kv(fields.iter().map(|(k, v)| (*k, v.as_str())))?;
        Ok(HttpResponse::new(OP_URL, 200, body))
    }

    fn check_authentication(&self, request: &Message) -> HttpResponse {
        self.check_auth_requests.fetch_add(1, Ordering::SeqCst);

        let mut original = request.clone();
        original.set_arg(Namespace::OpenId, "mode", "id_res");
        let valid = request.get_arg(Namespace::OpenId, "assoc_handle")
            == Some(self.private.handle.as_str())
            && self.private.check_message_signature(&original).unwrap_or(false);

        let mut body = format!("is_valid:{valid}\n");
        if let Some(handle) = request.get_arg(Namespace::OpenId, "invalidate_handle") {
            if !self.shared.lock().contains_key(handle) {
                let _ = writeln!(body, "invalidate_handle:{handle}");
            }
        }
        HttpResponse::new(OP_URL, 200, body)
    }
}

#[async_trait]
impl HttpFetcher for FakeProvider {
    async fn get(&self, url: &str) -> ConsumerResult<HttpResponse> {
        Err(ConsumerError::Http(format!("unexpected GET {url}")))
    }

    async fn post(&self, url: &str, body: String) -> ConsumerResult<HttpResponse> {
        if url != OP_URL {
            return Ok(HttpResponse::new(url, 404, ""));
        }
        let request = Message::from_url_encoded(&body)?;
        match request.get_arg(Namespace::OpenId, "mode") {
            Some("associate") => self.associate(&request),
            Some("check_authentication") => Ok(self.check_authentication(&request)),
            _ => Ok(HttpResponse::new(OP_URL, 400, "error:unknown mode\n")),
        }
    }
}

/// A relying party wired to a [`FakeProvider`].
pub struct RelyingParty {
    pub engine: GenericConsumer,
    pub associations: Arc<MemoryAssociationStore>,
    pub provider: Arc<FakeProvider>,
}

impl RelyingParty {
    pub fn new(config: ConsumerConfig, mode: AssociateMode) -> Self {
        init_tracing();
        let associations = Arc::new(MemoryAssociationStore::new());
        let provider = Arc::new(FakeProvider::new(mode));
        let engine = GenericConsumer::new(
            config,
            associations.clone(),
            Arc::new(MemoryNonceStore::new()),
            provider.clone(),
        )
        .with_dh_group(weak_group());
        Self {
            engine,
            associations,
            provider,
        }
    }
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn query_message(url: &str) -> anyhow::Result<Message> {
    let url = Url::parse(url)?;
    Ok(Message::from_post_args(url.query_pairs().into_owned())?)
}

/// The query of `return_to` followed by the provider's arguments.
pub fn browser_return(return_to: &str, response: &Message) -> anyhow::Result<Vec<(String, String)>> {
    let mut query: Vec<(String, String)> = Url::parse(return_to)?.query_pairs().into_owned().collect();
    query.extend(response.to_post_args());
    Ok(query)
}
