//! Catalog access: indexed snapshots and on-demand resolution.
//!
//! The cart store needs two things from the catalog: a synchronous snapshot
//! of the indexed records (hydration is gated on the index being loaded)
//! and an async lookup for ids not yet in the index. The index travels in a
//! `watch` channel so the store is woken when the catalog finishes loading.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::instrument;

use sundry_core::{CatalogRecord, ItemId};

use crate::error::CatalogError;

/// Shared snapshot of indexed catalog records.
pub type CatalogIndex = Arc<HashMap<ItemId, CatalogRecord>>;

/// Subscription to catalog index updates.
pub type CatalogWatch = watch::Receiver<CatalogIndex>;

/// Publishing half of the catalog index.
pub struct CatalogHandle {
    tx: watch::Sender<CatalogIndex>,
}

impl CatalogHandle {
    /// Create a handle and its watch, starting with an empty index.
    ///
    /// An empty index means "catalog not loaded yet" to the cart store, so
    /// publish only complete snapshots.
    #[must_use]
    pub fn new() -> (Self, CatalogWatch) {
        let (tx, rx) = watch::channel(CatalogIndex::default());
        (Self { tx }, rx)
    }

    /// Publish a full catalog snapshot, replacing the current index.
    pub fn publish(&self, records: Vec<CatalogRecord>) {
        let index: HashMap<ItemId, CatalogRecord> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        let _ = self.tx.send(Arc::new(index));
    }
}

/// On-demand resolution of catalog records by id.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Resolve records for the given ids. Unknown ids are omitted from the
    /// result rather than erroring.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] only for service-level failures.
    async fn resolve_by_ids(&self, ids: &[ItemId]) -> Result<Vec<CatalogRecord>, CatalogError>;
}

/// Resolver over a fixed set of records.
///
/// Useful in tests and for catalogs small enough to load wholesale.
pub struct StaticCatalogResolver {
    records: HashMap<ItemId, CatalogRecord>,
}

impl StaticCatalogResolver {
    /// Build a resolver from catalog records.
    #[must_use]
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
        }
    }
}

#[async_trait]
impl CatalogResolver for StaticCatalogResolver {
    async fn resolve_by_ids(&self, ids: &[ItemId]) -> Result<Vec<CatalogRecord>, CatalogError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect())
    }
}

/// Time-to-live for cached catalog records.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Upper bound on cached records.
const CACHE_CAPACITY: u64 = 10_000;

/// Resolver backed by the catalog HTTP API, with an in-memory cache.
///
/// Responses are cached for five minutes; a discontinued item therefore
/// disappears from hydration within one TTL.
#[derive(Clone)]
pub struct HttpCatalogResolver {
    client: reqwest::Client,
    base_url: String,
    cache: moka::future::Cache<ItemId, CatalogRecord>,
}

impl HttpCatalogResolver {
    /// Create a resolver for a catalog API at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            cache: moka::future::Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Fetch the entire catalog, e.g. to seed a [`CatalogHandle`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the request fails or the service
    /// responds with an error status.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let url = format!("{}/api/products", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch a single record; `None` for unknown ids.
    async fn fetch_record(&self, id: &ItemId) -> Result<Option<CatalogRecord>, CatalogError> {
        let url = format!("{}/api/products/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl CatalogResolver for HttpCatalogResolver {
    #[instrument(skip(self))]
    async fn resolve_by_ids(&self, ids: &[ItemId]) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(hit) = self.cache.get(id).await {
                records.push(hit);
                continue;
            }
            if let Some(record) = self.fetch_record(id).await? {
                self.cache.insert(id.clone(), record.clone()).await;
                records.push(record);
            }
        }
        Ok(records)
    }
}
