//! Bearer-token identity verification.
//!
//! Verification is a seam: the production deployment plugs a real identity
//! provider in behind [`TokenVerifier`], the default implementation is a
//! static token map from configuration. Handlers receive the verified
//! identity via the [`Identity`] extractor and never see the raw token.

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use sundry_core::IdentityId;

use crate::error::ApiError;
use crate::state::ApiState;

/// Maps bearer tokens to identities.
pub trait TokenVerifier: Send + Sync {
    /// The identity the token belongs to, or `None` if unverifiable.
    fn verify(&self, token: &str) -> Option<IdentityId>;
}

/// Verifier over a fixed token map.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, IdentityId>,
}

impl StaticTokenVerifier {
    /// Build a verifier from `(token, identity)` pairs.
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(token, identity)| (token, IdentityId::new(identity)))
                .collect(),
        }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<IdentityId> {
        self.tokens.get(token).cloned()
    }
}

/// Verified caller identity, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityId);

impl FromRequestParts<ApiState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let identity = state.verify(token).ok_or(ApiError::Unauthorized)?;
        Ok(Self(identity))
    }
}
