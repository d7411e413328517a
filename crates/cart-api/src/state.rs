//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sundry_core::{CartRecord, CatalogRecord, IdentityId, ItemId};

use crate::auth::TokenVerifier;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Cart records live in an in-memory map; the
/// wire contract is the same whatever sits behind it.
#[derive(Clone)]
pub struct ApiState {
    inner: Arc<ApiStateInner>,
}

struct ApiStateInner {
    verifier: Arc<dyn TokenVerifier>,
    catalog: HashMap<ItemId, CatalogRecord>,
    carts: RwLock<HashMap<IdentityId, CartRecord>>,
}

impl ApiState {
    /// Create state over a verifier and the catalog to serve.
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, catalog: Vec<CatalogRecord>) -> Self {
        Self {
            inner: Arc::new(ApiStateInner {
                verifier,
                catalog: catalog
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect(),
                carts: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Verify a bearer token.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<IdentityId> {
        self.inner.verifier.verify(token)
    }

    /// All catalog records, in unspecified order.
    #[must_use]
    pub fn catalog_records(&self) -> Vec<CatalogRecord> {
        self.inner.catalog.values().cloned().collect()
    }

    /// One catalog record by id.
    #[must_use]
    pub fn catalog_record(&self, id: &ItemId) -> Option<CatalogRecord> {
        self.inner.catalog.get(id).cloned()
    }

    /// The identity's cart record; empty if none has been stored.
    #[must_use]
    pub fn cart(&self, identity: &IdentityId) -> CartRecord {
        self.inner
            .carts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the identity's cart record with a full snapshot.
    pub fn replace_cart(&self, identity: IdentityId, record: CartRecord) {
        self.inner
            .carts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity, record);
    }
}
