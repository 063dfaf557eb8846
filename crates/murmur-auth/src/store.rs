//! In-memory identity store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::identity::{Identity, IdentityId};
use crate::token::{digest_token, generate_token, TokenDigest, TokenRecord};

/// Resolves a credential to a verified identity.
///
/// The relay core never calls this; only the request layer does, before a
/// session is admitted.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a credential, failing with [`AuthError::InvalidCredential`].
    async fn verify(&self, credential: &str) -> Result<Identity>;

    /// Look up the profile of a sender.
    fn profile(&self, identity_id: &str) -> Option<Identity>;
}

/// Identity and token storage.
#[derive(Debug, Clone, Default)]
pub struct IdentityStore {
    identities: Arc<RwLock<HashMap<IdentityId, Identity>>>,
    tokens: Arc<RwLock<HashMap<TokenDigest, TokenRecord>>>,
}

impl IdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new identity.
    pub fn register(&self, identity: Identity) -> Result<()> {
        Identity::validate_id(&identity.id)?;

        let mut identities = self.identities.write();
        if identities.contains_key(&identity.id) {
            return Err(AuthError::IdentityExists(identity.id));
        }

        debug!(identity = %identity.id, "Identity registered");
        identities.insert(identity.id.clone(), identity);
        Ok(())
    }

    /// Remove an identity along with every token that resolves to it.
    pub fn unregister(&self, identity_id: &str) -> Result<Identity> {
        let identity = self
            .identities
            .write()
            .remove(identity_id)
            .ok_or_else(|| AuthError::UnknownIdentity(identity_id.to_string()))?;

        self.tokens
            .write()
            .retain(|_, record| record.identity_id != identity_id);

        Ok(identity)
    }

    /// Get an identity by id.
    pub fn get(&self, identity_id: &str) -> Option<Identity> {
        self.identities.read().get(identity_id).cloned()
    }

    /// Issue a new random token for an identity.
    ///
    /// Returns the plaintext, which is not retrievable afterwards.
    pub fn issue_token(&self, identity_id: &str) -> Result<String> {
        let token = generate_token();
        self.add_token(identity_id, &token)?;
        Ok(token)
    }

    /// Register a caller-chosen token for an identity.
    pub fn add_token(&self, identity_id: &str, token: &str) -> Result<()> {
        if !self.identities.read().contains_key(identity_id) {
            return Err(AuthError::UnknownIdentity(identity_id.to_string()));
        }

        self.tokens
            .write()
            .insert(digest_token(token), TokenRecord::new(identity_id));
        Ok(())
    }

    /// Revoke a token. Returns whether it existed.
    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().remove(&digest_token(token)).is_some()
    }

    /// Resolve a token synchronously.
    pub fn resolve(&self, token: &str) -> Result<Identity> {
        let identity_id = self
            .tokens
            .read()
            .get(&digest_token(token))
            .map(|record| record.identity_id.clone())
            .ok_or(AuthError::InvalidCredential)?;

        self.get(&identity_id).ok_or(AuthError::InvalidCredential)
    }

    /// Number of registered identities.
    pub fn identity_count(&self) -> usize {
        self.identities.read().len()
    }

    /// Number of live tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }
}

#[async_trait]
impl IdentityVerifier for IdentityStore {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        self.resolve(credential)
    }

    fn profile(&self, identity_id: &str) -> Option<Identity> {
        self.get(identity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_alice() -> IdentityStore {
        let store = IdentityStore::new();
        store
            .register(Identity::new("alice", "Alice").with_avatar("https://img/alice.png"))
            .unwrap();
        store
    }

    #[test]
    fn test_register_duplicate() {
        let store = store_with_alice();
        let err = store.register(Identity::new("alice", "Other")).unwrap_err();
        assert_eq!(err, AuthError::IdentityExists("alice".into()));
        assert_eq!(store.identity_count(), 1);
    }

    #[test]
    fn test_register_invalid_id() {
        let store = IdentityStore::new();
        assert!(matches!(
            store.register(Identity::new("no spaces", "x")),
            Err(AuthError::InvalidIdentityId(_))
        ));
    }

    #[test]
    fn test_issue_and_resolve() {
        let store = store_with_alice();
        let token = store.issue_token("alice").unwrap();

        let identity = store.resolve(&token).unwrap();
        assert_eq!(identity.id, "alice");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://img/alice.png"));
    }

    #[test]
    fn test_issue_for_unknown_identity() {
        let store = IdentityStore::new();
        assert_eq!(
            store.issue_token("ghost").unwrap_err(),
            AuthError::UnknownIdentity("ghost".into())
        );
    }

    #[test]
    fn test_resolve_unknown_token() {
        let store = store_with_alice();
        assert_eq!(
            store.resolve("murmur_nope").unwrap_err(),
            AuthError::InvalidCredential
        );
    }

    #[test]
    fn test_revoke_token() {
        let store = store_with_alice();
        store.add_token("alice", "static-dev-token").unwrap();
        assert!(store.resolve("static-dev-token").is_ok());

        assert!(store.revoke_token("static-dev-token"));
        assert!(!store.revoke_token("static-dev-token"));
        assert!(store.resolve("static-dev-token").is_err());
    }

    #[test]
    fn test_unregister_drops_tokens() {
        let store = store_with_alice();
        let token = store.issue_token("alice").unwrap();
        store.register(Identity::new("bob", "Bob")).unwrap();
        store.issue_token("bob").unwrap();

        store.unregister("alice").unwrap();
        assert_eq!(store.token_count(), 1);
        assert!(store.resolve(&token).is_err());
        assert!(store.unregister("alice").is_err());
    }

    #[tokio::test]
    async fn test_verifier_trait() {
        let store = store_with_alice();
        let token = store.issue_token("alice").unwrap();
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(store);

        assert_eq!(verifier.verify(&token).await.unwrap().id, "alice");
        assert_eq!(
            verifier.verify("bogus").await.unwrap_err(),
            AuthError::InvalidCredential
        );
        assert!(verifier.profile("alice").is_some());
        assert!(verifier.profile("bob").is_none());
    }
}
