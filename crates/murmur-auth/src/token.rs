//! Bearer tokens.
//!
//! Only the SHA-256 digest of a token is kept in memory; the plaintext is
//! handed back once, when the token is issued.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token format: murmur_<secret>
const TOKEN_PREFIX: &str = "murmur_";
const TOKEN_SECRET_LEN: usize = 40;

/// Hex encoded SHA-256 digest of a token.
pub type TokenDigest = String;

/// A stored token record.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// Identity the token resolves to.
    pub identity_id: String,
    /// When the token was issued (Unix seconds).
    pub issued_at: u64,
}

impl TokenRecord {
    /// Create a record issued now.
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            issued_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Generate a fresh random token.
pub fn generate_token() -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SECRET_LEN)
        .map(char::from)
        .collect();
    format!("{TOKEN_PREFIX}{secret}")
}

/// Digest a token for storage and lookup.
pub fn digest_token(token: &str) -> TokenDigest {
    hex::encode(Sha256::digest(token.as_bytes()))
}
