//! Error types for identity verification.

use thiserror::Error;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while verifying credentials or managing identities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The credential did not resolve to a known identity.
    #[error("invalid credential")]
    InvalidCredential,

    /// The identity is not registered.
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// An identity with this id is already registered.
    #[error("identity already exists: {0}")]
    IdentityExists(String),

    /// The identity id is empty or contains forbidden characters.
    #[error("invalid identity id: {0}")]
    InvalidIdentityId(String),
}
