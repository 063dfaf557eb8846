//! Identity verification for the Murmur relay.
//!
//! This crate provides:
//! - **Identities**: who a sender is, plus the avatar used as a message attachment
//! - **Tokens**: opaque bearer credentials, stored as SHA-256 digests
//! - **Verification**: the [`IdentityVerifier`] seam used by the request layer
//!
//! # Example
//!
//! ```
//! use murmur_auth::{Identity, IdentityStore};
//!
//! let store = IdentityStore::new();
//! store
//!     .register(Identity::new("alice", "Alice").with_avatar("https://img/alice.png"))
//!     .unwrap();
//!
//! let token = store.issue_token("alice").unwrap();
//! let identity = store.resolve(&token).unwrap();
//! assert_eq!(identity.id, "alice");
//! ```

mod error;
mod identity;
mod store;
mod token;

pub use error::{AuthError, Result};
pub use identity::{Identity, IdentityId, IDENTITY_ID_REGEX, MAX_IDENTITY_ID_LENGTH};
pub use store::{IdentityStore, IdentityVerifier};
pub use token::{digest_token, generate_token};
