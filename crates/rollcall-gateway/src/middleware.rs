use axum::http::HeaderMap;
use rollcall_core::{IdentityVerifier, Principal, Role, RollcallError, RollcallResult};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One accepted bearer token, stored as its SHA-256 digest.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    /// Lowercase hex SHA-256 of the raw token.
    pub token_sha256: String,
    /// Principal id the token authenticates as.
    pub id: String,
    /// Role granted to that principal.
    pub role: Role,
}

/// Verifies bearer tokens against a fixed table of digests.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    by_digest: HashMap<String, Principal>,
}

impl TokenVerifier {
    /// Build from configured token entries. Digests are matched
    /// case-insensitively.
    pub fn new(entries: impl IntoIterator<Item = TokenEntry>) -> Self {
        let by_digest = entries
            .into_iter()
            .map(|e| {
                (
                    e.token_sha256.to_ascii_lowercase(),
                    Principal {
                        id: e.id,
                        role: e.role,
                    },
                )
            })
            .collect();
        Self { by_digest }
    }

    /// Convenience for tests and demos: register a raw token.
    pub fn with_token(mut self, token: &str, principal: Principal) -> Self {
        self.by_digest.insert(digest(token), principal);
        self
    }

    /// Number of accepted tokens.
    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    /// Whether no token is accepted at all.
    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}

impl IdentityVerifier for TokenVerifier {
    fn verify(&self, credential: &str) -> RollcallResult<Principal> {
        if credential.is_empty() {
            return Err(RollcallError::Authentication("empty token".into()));
        }
        self.by_digest
            .get(&digest(credential))
            .cloned()
            .ok_or_else(|| RollcallError::Authentication("invalid token".into()))
    }
}

/// Lowercase hex SHA-256 of `token`.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Query string accepted by authenticated routes.
#[derive(Deserialize, Default)]
pub struct AuthQuery {
    /// Raw bearer token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// Pull the credential from `Authorization: Bearer <token>`, falling back
/// to the `?token=` query parameter.
pub fn credential(headers: &HeaderMap, query: &AuthQuery) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .or_else(|| query.token.clone())
}

/// Resolve the caller of an HTTP or WebSocket request to a principal.
pub fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
    query: &AuthQuery,
) -> RollcallResult<Principal> {
    let token = credential(headers, query)
        .ok_or_else(|| RollcallError::Authentication("token required".into()))?;
    verifier.verify(&token)
}
