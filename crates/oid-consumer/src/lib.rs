//! # oid-consumer
//!
//! OpenID 1.x relying-party protocol engine.
//!
//! A relying party sends the user to their provider with an
//! [`AuthRequest`] and verifies the response that comes back through the
//! browser. Verification uses a shared secret negotiated ahead of time (an
//! association) or, failing that, asks the provider directly (dumb mode).
//! Every accepted response consumes a single-use nonce.
//!
//! ## Modules
//!
//! - [`generic`] - The engine: association lifecycle and response verification
//! - [`consumer`] - Session-aware facade over the engine
//! - [`message`] - Namespace-aware protocol messages
//! - [`kvform`] - Key-value form encoding used in direct responses
//! - [`session`] - Diffie-Hellman and plaintext association sessions
//! - [`signing`] - Message signatures under an association
//! - [`auth_request`] - Redirect URLs to the provider
//! - [`response`] - Authentication outcomes
//! - [`nonce`] - Replay-protection nonces
//! - [`fetcher`] - HTTP transport
//! - [`discovery`] - Identifier to endpoint resolution seam
//! - [`config`] - Configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use oid_consumer::{ConsumerConfig, Endpoint, GenericConsumer, ReqwestFetcher};
//! use oid_store::{MemoryAssociationStore, MemoryNonceStore};
//!
//! # async fn example() -> oid_consumer::ConsumerResult<()> {
//! let config = ConsumerConfig::from_env()?;
//! let fetcher = ReqwestFetcher::new(config.fetch_timeout_duration())?;
//! let engine = GenericConsumer::new(
//!     config,
//!     Arc::new(MemoryAssociationStore::new()),
//!     Arc::new(MemoryNonceStore::new()),
//!     Arc::new(fetcher),
//! );
//!
//! let endpoint = Endpoint::new("http://user.example/", "http://op.example/server");
//! let request = engine.begin(endpoint).await?;
//! let redirect = request.redirect_url("http://rp.example/", "http://rp.example/finish", false);
//! # let _ = (redirect, Duration::ZERO);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth_request;
pub mod config;
pub mod consumer;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod generic;
pub mod kvform;
pub mod message;
pub mod nonce;
pub mod response;
pub mod session;
pub mod signing;

// Re-export commonly used types
pub use auth_request::AuthRequest;
pub use config::ConsumerConfig;
pub use consumer::Consumer;
pub use discovery::{Discovery, StaticDiscovery};
pub use endpoint::Endpoint;
pub use error::{ConsumerError, ConsumerResult};
pub use fetcher::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use generic::GenericConsumer;
pub use message::{Message, Namespace};
pub use response::{Response, Status, SuccessResponse};
pub use session::ConsumerSession;
pub use signing::MessageSigning;
