//! Identity observation and credential minting.
//!
//! Identity resolves asynchronously and on an unpredictable schedule
//! relative to cart edits. The observer half is a `watch` receiver: the
//! cart store reads the current state synchronously and is woken on every
//! transition. Credentials are minted lazily immediately before each
//! remote call - they may expire at any time, so they are never cached.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;

use sundry_core::IdentityId;

use crate::error::CredentialError;

/// Mints a fresh credential token for remote calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Produce a currently-valid bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the identity provider cannot mint a
    /// token right now.
    async fn credential(&self) -> Result<SecretString, CredentialError>;
}

/// Credential provider returning a fixed token.
///
/// Suitable for tests and long-lived service tokens.
pub struct StaticCredentials {
    token: SecretString,
}

impl StaticCredentials {
    /// Wrap a fixed token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential(&self) -> Result<SecretString, CredentialError> {
        Ok(self.token.clone())
    }
}

/// An authenticated identity together with its credential source.
#[derive(Clone)]
pub struct AuthenticatedIdentity {
    /// Identity the remote cart record is keyed by.
    pub identity_id: IdentityId,
    provider: Arc<dyn CredentialProvider>,
}

impl AuthenticatedIdentity {
    /// Create an authenticated identity.
    #[must_use]
    pub fn new(identity_id: impl Into<IdentityId>, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            identity_id: identity_id.into(),
            provider,
        }
    }

    /// Mint a fresh credential for an immediate remote call.
    ///
    /// # Errors
    ///
    /// Propagates the provider's [`CredentialError`].
    pub async fn credential(&self) -> Result<SecretString, CredentialError> {
        self.provider.credential().await
    }
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("identity_id", &self.identity_id)
            .field("provider", &"[REDACTED]")
            .finish()
    }
}

/// Tri-state identity reported by the identity observer.
#[derive(Debug, Clone, Default)]
pub enum IdentityState {
    /// The observer has not reported yet. Not the same as guest: the cart
    /// must not pick a backend until identity resolves.
    #[default]
    Unresolved,
    /// Anonymous shopper; the local store is authoritative.
    Guest,
    /// Signed-in shopper; the remote record is authoritative.
    Authenticated(AuthenticatedIdentity),
}

impl IdentityState {
    /// Whether this state carries an authenticated identity.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The authenticated identity id, if any.
    #[must_use]
    pub const fn identity_id(&self) -> Option<&IdentityId> {
        match self {
            Self::Authenticated(auth) => Some(&auth.identity_id),
            Self::Unresolved | Self::Guest => None,
        }
    }
}

/// Subscription to identity transitions, consumed by the cart store.
pub type IdentityObserver = watch::Receiver<IdentityState>;

/// Publishing half of the identity observer.
///
/// Owned by whatever drives authentication (sign-in flow, tests).
pub struct IdentityHandle {
    tx: watch::Sender<IdentityState>,
}

impl IdentityHandle {
    /// Create a handle and its observer, starting at
    /// [`IdentityState::Unresolved`].
    #[must_use]
    pub fn new() -> (Self, IdentityObserver) {
        let (tx, rx) = watch::channel(IdentityState::Unresolved);
        (Self { tx }, rx)
    }

    /// Publish an identity transition to all observers.
    pub fn publish(&self, state: IdentityState) {
        // Send only fails when every observer is gone; nothing to do then.
        let _ = self.tx.send(state);
    }

    /// Convenience: publish a guest identity.
    pub fn publish_guest(&self) {
        self.publish(IdentityState::Guest);
    }

    /// Convenience: publish an authenticated identity.
    pub fn publish_authenticated(
        &self,
        identity_id: impl Into<IdentityId>,
        provider: Arc<dyn CredentialProvider>,
    ) {
        self.publish(IdentityState::Authenticated(AuthenticatedIdentity::new(
            identity_id,
            provider,
        )));
    }
}
