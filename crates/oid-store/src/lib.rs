//! # oid-store
//!
//! Storage abstractions for the OpenID consumer.
//!
//! The protocol engine never owns persistent state. It talks to three
//! collaborators, each of which must make its operations atomic:
//!
//! - [`AssociationStore`] - Shared secrets negotiated with providers
//! - [`NonceStore`] - Check-and-consume of single-use nonces
//! - [`SessionStore`] - In-flight transaction state between redirect and return
//!
//! In-memory implementations live in [`memory`]; they are suitable for a
//! single process and for tests. Deployments with several relying-party
//! instances need a shared backend.
//!
//! ## Example
//!
//! ```ignore
//! use oid_store::{AssociationStore, MemoryAssociationStore, StoreResult};
//!
//! async fn current(store: &MemoryAssociationStore) -> StoreResult<bool> {
//!     Ok(store.get_association("https://op.example/", None).await?.is_some())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod association;
pub mod error;
pub mod memory;
pub mod nonce;
pub mod session;

pub use association::{Association, AssociationStore};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryAssociationStore, MemoryNonceStore, MemorySession};
pub use nonce::NonceStore;
pub use session::SessionStore;
