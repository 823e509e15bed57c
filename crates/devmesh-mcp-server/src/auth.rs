//! Authenticator (C3): resolves a bearer token or API key into a tenant,
//! principal, and scope set via a salted-hash lookup against the
//! `KeyStore`.
//!
//! Runs once per connection, directly from the WebSocket upgrade handler,
//! rather than as a `tower::Layer`/`Service` wrapping a request pipeline:
//! there is no sequence of per-frame HTTP requests here for a Service to
//! sit in front of, only a single handshake. The verification step itself
//! is a hash-and-lookup rather than a signature check: this server never
//! mints or verifies a token structurally, it only asks the key store
//! whether the hash of what it was handed is live.

use crate::store::{KeyStore, ToolAuthRecipe};
use devmesh_mcp_protocol::context::Principal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Hex-encoded SHA-256 of `salt || raw_credential`. The salt is a
/// deployment-wide pepper, not a per-key salt — the key store itself is
/// expected to store only hashes, so a leaked store snapshot doesn't
/// recover usable credentials.
pub fn hash_credential(raw: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header or api key")]
    MissingCredential,
    #[error("credential not recognized")]
    NotFound,
    #[error("credential revoked")]
    Revoked,
    #[error("credential expired")]
    Expired,
}

/// Extracts the raw bearer token or API key from upgrade headers. Bearer
/// takes priority over `X-API-Key` when both are present.
pub fn extract_raw_credential(headers: &http::HeaderMap) -> Option<(&'static str, String)> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                return Some(("bearer", token.to_string()));
            }
        }
    }
    if let Some(value) = headers.get("X-API-Key") {
        if let Ok(s) = value.to_str() {
            return Some(("api_key", s.to_string()));
        }
    }
    None
}

pub struct Authenticator {
    key_store: Arc<dyn KeyStore>,
    salt: String,
}

impl Authenticator {
    pub fn new(key_store: Arc<dyn KeyStore>, salt: impl Into<String>) -> Self {
        Self {
            key_store,
            salt: salt.into(),
        }
    }

    /// Resolves upgrade headers into an authenticated `Principal`.
    /// `X-Tenant-ID`, if present, is never consulted here — the
    /// authoritative tenant always comes from the key lookup.
    pub async fn authenticate_headers(&self, headers: &http::HeaderMap) -> Result<Principal, AuthError> {
        let (_kind, raw) = extract_raw_credential(headers).ok_or(AuthError::MissingCredential)?;
        self.authenticate_raw(&raw).await
    }

    pub async fn authenticate_raw(&self, raw: &str) -> Result<Principal, AuthError> {
        let hash = hash_credential(raw, &self.salt);
        let record = self.key_store.lookup(&hash).await.ok_or(AuthError::NotFound)?;

        if record.revoked {
            return Err(AuthError::Revoked);
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at <= chrono::Utc::now() {
                return Err(AuthError::Expired);
            }
        }

        Ok(Principal::new(record.tenant_id, record.principal_id, record.scopes))
    }
}

/// What a resolved credential means for C5's credential resolution
/// priority: the `stored` tier reuses the same auth recipe vocabulary as
/// `ToolAuthRecipe` so a tool can declare what kind of credential it
/// expects regardless of provenance.
pub fn recipe_label(recipe: ToolAuthRecipe) -> &'static str {
    match recipe {
        ToolAuthRecipe::Bearer => "bearer",
        ToolAuthRecipe::Basic => "basic",
        ToolAuthRecipe::ApiKey => "api_key",
        ToolAuthRecipe::None => "none",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryKeyStore, KeyRecord};
    use std::collections::HashSet;

    fn headers_with_bearer(token: &str) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn resolves_tenant_and_principal_from_bearer_token() {
        let store = InMemoryKeyStore::new();
        let hash = hash_credential("secret-token", "pepper");
        store.insert(
            hash,
            KeyRecord {
                tenant_id: "tenant-a".into(),
                principal_id: "user-1".into(),
                scopes: HashSet::from(["tools:call".to_string()]),
                rate_limit_per_period: Some(100),
                expires_at: None,
                revoked: false,
            },
        );
        let auth = Authenticator::new(Arc::new(store), "pepper");
        let principal = auth
            .authenticate_headers(&headers_with_bearer("secret-token"))
            .await
            .unwrap();
        assert_eq!(principal.tenant_id, "tenant-a");
        assert!(principal.has_scope("tools:call"));
    }

    #[tokio::test]
    async fn unknown_credential_is_not_found() {
        let auth = Authenticator::new(Arc::new(InMemoryKeyStore::new()), "pepper");
        let err = auth
            .authenticate_headers(&headers_with_bearer("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotFound);
    }

    #[tokio::test]
    async fn revoked_key_is_rejected() {
        let store = InMemoryKeyStore::new();
        let hash = hash_credential("tok", "pepper");
        store.insert(
            hash,
            KeyRecord {
                tenant_id: "tenant-a".into(),
                principal_id: "user-1".into(),
                scopes: HashSet::new(),
                rate_limit_per_period: None,
                expires_at: None,
                revoked: true,
            },
        );
        let auth = Authenticator::new(Arc::new(store), "pepper");
        let err = auth.authenticate_headers(&headers_with_bearer("tok")).await.unwrap_err();
        assert_eq!(err, AuthError::Revoked);
    }

    #[tokio::test]
    async fn missing_header_is_missing_credential() {
        let auth = Authenticator::new(Arc::new(InMemoryKeyStore::new()), "pepper");
        let err = auth.authenticate_headers(&http::HeaderMap::new()).await.unwrap_err();
        assert_eq!(err, AuthError::MissingCredential);
    }
}
