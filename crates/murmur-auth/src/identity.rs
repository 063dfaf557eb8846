//! Verified identities.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Maximum length of an identity id.
pub const MAX_IDENTITY_ID_LENGTH: usize = 64;

/// Character set of an identity id.
pub static IDENTITY_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("Invalid regex"));

/// Identifier of a user as it appears in the `sender` field of messages.
pub type IdentityId = String;

/// A verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier.
    pub id: IdentityId,
    /// Human-readable name.
    pub display_name: String,
    /// Avatar URL, attached to messages this identity sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Create an identity without an avatar.
    pub fn new(id: impl Into<IdentityId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Attach an avatar URL.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Validate an identity id.
    ///
    /// Ids are 1..=64 characters of ASCII alphanumerics, `-`, `_` or `.`.
    pub fn validate_id(id: &str) -> Result<()> {
        if id.len() <= MAX_IDENTITY_ID_LENGTH && IDENTITY_ID_REGEX.is_match(id) {
            Ok(())
        } else {
            Err(AuthError::InvalidIdentityId(id.to_string()))
        }
    }
}
