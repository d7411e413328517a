//! Remote authoritative cart backend.
//!
//! The remote record is keyed by the caller's authenticated identity; a
//! fresh credential is supplied per call. Writes are idempotent full
//! snapshot replacements, never deltas, so a lost write corrupts nothing.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use sundry_core::{CartRecord, CompactItem};

use crate::error::RemoteCartError;

/// Authenticated access to the remote cart record.
#[async_trait]
pub trait RemoteCartBackend: Send + Sync {
    /// Fetch the identity's compact item list; empty if no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCartError`] for transport failures or rejections.
    async fn fetch(&self, credential: &SecretString) -> Result<Vec<CompactItem>, RemoteCartError>;

    /// Replace the identity's record with a full snapshot.
    ///
    /// Quantities must already be clamped to what the backend accepts.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCartError`] for transport failures or rejections.
    async fn replace(
        &self,
        credential: &SecretString,
        items: &[CompactItem],
    ) -> Result<(), RemoteCartError>;
}

/// reqwest-backed client for the cart API wire contract.
#[derive(Clone)]
pub struct HttpRemoteCart {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteCart {
    /// Create a client for a cart API at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn cart_url(&self) -> String {
        format!("{}/api/cart", self.base_url)
    }
}

#[async_trait]
impl RemoteCartBackend for HttpRemoteCart {
    #[instrument(skip(self, credential))]
    async fn fetch(&self, credential: &SecretString) -> Result<Vec<CompactItem>, RemoteCartError> {
        let response = self
            .client
            .get(self.cart_url())
            .bearer_auth(credential.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteCartError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let record: CartRecord = response.json().await?;
        Ok(record.items)
    }

    #[instrument(skip(self, credential, items), fields(lines = items.len()))]
    async fn replace(
        &self,
        credential: &SecretString,
        items: &[CompactItem],
    ) -> Result<(), RemoteCartError> {
        let record = CartRecord::new(items.to_vec());
        let response = self
            .client
            .put(self.cart_url())
            .bearer_auth(credential.expose_secret())
            .json(&record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteCartError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
