//! Cart store: reactive cart state and load-or-merge orchestration.
//!
//! The store owns the live snapshot of line items, drives the
//! guest/authenticated lifecycle as an explicit state machine, and hands
//! every durable write to the [`SyncScheduler`]. It is constructed with
//! injected dependencies and has an `init()`/`dispose()` lifecycle, so
//! tests can run multiple isolated instances.
//!
//! Mutations apply to the in-memory snapshot synchronously, in call order.
//! Their persisted effects are coalesced by the scheduler: an observer of
//! the durable store may see only the final state of a rapid burst, never
//! an intermediate one, and never out of order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use sundry_core::{CatalogRecord, CompactItem, IdentityId, ItemId, LineItem};

use crate::catalog::{CatalogIndex, CatalogResolver, CatalogWatch};
use crate::codec::{self, clamp_quantity};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::identity::{AuthenticatedIdentity, IdentityObserver, IdentityState};
use crate::merge;
use crate::scheduler::{SnapshotWriter, SyncScheduler, SyncTarget};
use crate::storage::{LocalCartStorage, RemoteCartBackend};

/// Identity context owning the live snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartContext {
    /// Anonymous shopper; local store is authoritative.
    Guest,
    /// Signed-in shopper; remote record is authoritative.
    Authenticated(IdentityId),
}

/// Lifecycle phase of the cart store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartPhase {
    /// Identity has not resolved yet.
    Uninitialized,
    /// Hydrating the guest cart from the local store.
    LoadingGuest,
    /// Fetching the authenticated cart from the remote backend.
    LoadingAuthenticated,
    /// Running the one-shot login reconciliation.
    Merging,
    /// Live and accepting mutations.
    Ready(CartContext),
}

/// Snapshot published to the UI layer on every change.
#[derive(Debug, Clone, Default)]
pub struct CartSnapshot {
    /// Current line items.
    pub items: Vec<LineItem>,
    /// Whether the store has reached `Ready`.
    pub ready: bool,
    /// Set when the last load from the authoritative backend failed; the
    /// snapshot is empty rather than stale in that case.
    pub load_failed: bool,
}

impl CartSnapshot {
    /// Sum of all line quantities.
    #[must_use]
    pub fn total_item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Dependencies injected into a [`CartStore`].
pub struct CartStoreDeps {
    /// Identity transitions.
    pub identity: IdentityObserver,
    /// Catalog index updates; an empty index means "not loaded yet".
    pub catalog: CatalogWatch,
    /// On-demand catalog lookup for ids not yet in the index.
    pub resolver: Arc<dyn CatalogResolver>,
    /// Guest-owned local store.
    pub local: Arc<dyn LocalCartStorage>,
    /// Authenticated remote backend.
    pub remote: Arc<dyn RemoteCartBackend>,
    /// Engine tunables.
    pub config: CartConfig,
}

struct StoreState {
    phase: CartPhase,
    items: Vec<LineItem>,
    load_failed: bool,
}

/// Routes flushed snapshots to the backend owned by the current identity.
struct BackendWriter {
    local: Arc<dyn LocalCartStorage>,
    remote: Arc<dyn RemoteCartBackend>,
    identity: IdentityObserver,
}

#[async_trait]
impl SnapshotWriter for BackendWriter {
    async fn persist(&self, target: SyncTarget, items: Vec<CompactItem>) -> Result<(), CartError> {
        match target {
            SyncTarget::Local => {
                // An empty guest cart is an absent record, not a stored
                // empty list.
                if items.is_empty() {
                    self.local.clear()?;
                } else {
                    self.local.store(&items)?;
                }
                Ok(())
            }
            SyncTarget::Remote => {
                let auth = match &*self.identity.borrow() {
                    IdentityState::Authenticated(auth) => auth.clone(),
                    IdentityState::Unresolved | IdentityState::Guest => {
                        // Signed out between schedule and flush; the remote
                        // record now belongs to nobody we can write for.
                        debug!("skipping remote write, identity no longer authenticated");
                        return Ok(());
                    }
                };
                let credential = auth.credential().await?;
                self.remote.replace(&credential, &items).await?;
                Ok(())
            }
        }
    }
}

struct StoreInner {
    config: CartConfig,
    local: Arc<dyn LocalCartStorage>,
    remote: Arc<dyn RemoteCartBackend>,
    resolver: Arc<dyn CatalogResolver>,
    identity: IdentityObserver,
    catalog: CatalogWatch,
    scheduler: SyncScheduler,
    state: Mutex<StoreState>,
    snapshot_tx: watch::Sender<CartSnapshot>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// What `evaluate` decided to do for the current identity/catalog pair.
enum Transition {
    Stay,
    LoadGuest,
    LoadAuthenticated(AuthenticatedIdentity),
    Merge(AuthenticatedIdentity),
    SignOut,
}

/// The reactive cart store.
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<StoreInner>,
}

impl CartStore {
    /// Build a store from its dependencies. Call [`CartStore::init`] to
    /// start observing identity and catalog changes.
    #[must_use]
    pub fn new(deps: CartStoreDeps) -> Self {
        let writer = Arc::new(BackendWriter {
            local: deps.local.clone(),
            remote: deps.remote.clone(),
            identity: deps.identity.clone(),
        });
        let scheduler = SyncScheduler::new(deps.config.debounce, writer);
        let (snapshot_tx, _) = watch::channel(CartSnapshot::default());

        Self {
            inner: Arc::new(StoreInner {
                config: deps.config,
                local: deps.local,
                remote: deps.remote,
                resolver: deps.resolver,
                identity: deps.identity,
                catalog: deps.catalog,
                scheduler,
                state: Mutex::new(StoreState {
                    phase: CartPhase::Uninitialized,
                    items: Vec::new(),
                    load_failed: false,
                }),
                snapshot_tx,
                driver: Mutex::new(None),
            }),
        }
    }

    /// Start the driver task reacting to identity and catalog changes.
    ///
    /// The driver exits when either channel's publishing half is dropped.
    pub fn init(&self) {
        let store = self.clone();
        let mut identity = self.inner.identity.clone();
        let mut catalog = self.inner.catalog.clone();

        let handle = tokio::spawn(async move {
            loop {
                store.evaluate().await;
                tokio::select! {
                    result = identity.changed() => {
                        if result.is_err() {
                            break;
                        }
                    }
                    result = catalog.changed() => {
                        if result.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("identity or catalog channel closed, cart driver exiting");
        });

        *self.lock_driver() = Some(handle);
    }

    /// Stop the driver and cancel pending debounced writes.
    ///
    /// An already in-flight write completes; its result is advisory only.
    pub fn dispose(&self) {
        if let Some(handle) = self.lock_driver().take() {
            handle.abort();
        }
        self.inner.scheduler.dispose();
    }

    // =========================================================================
    // UI surface
    // =========================================================================

    /// Subscribe to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Current line items.
    #[must_use]
    pub fn cart_items(&self) -> Vec<LineItem> {
        self.lock_state().items.clone()
    }

    /// Whether the store has reached `Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.lock_state().phase, CartPhase::Ready(_))
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> CartPhase {
        self.lock_state().phase.clone()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_item_count(&self) -> u32 {
        self.lock_state().items.iter().map(|item| item.quantity).sum()
    }

    /// Add `quantity` units of an item, resolving its catalog record from
    /// the index or, failing that, the resolver. Unresolvable ids are a
    /// no-op rather than a partial record.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, item_id: &ItemId, quantity: u32) {
        if quantity == 0 {
            return;
        }

        let record = self.inner.catalog.borrow().get(item_id).cloned();
        let record = match record {
            Some(record) => Some(record),
            None => self.resolve_one(item_id).await,
        };
        let Some(record) = record else {
            debug!(item = %item_id, "unknown item, ignoring add");
            return;
        };

        let max = self.inner.config.max_quantity;
        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|line| line.item_id() == item_id) {
                existing.quantity = clamp_quantity(existing.quantity.saturating_add(quantity), max);
            } else {
                items.push(LineItem::new(record, clamp_quantity(quantity, max)));
            }
        });
    }

    /// Increase an item's quantity by one, clamped at the maximum.
    pub fn increase_qty(&self, item_id: &ItemId) {
        let max = self.inner.config.max_quantity;
        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|line| line.item_id() == item_id) {
                existing.quantity = clamp_quantity(existing.quantity.saturating_add(1), max);
            }
        });
    }

    /// Decrease an item's quantity by one, flooring at one. Removal is a
    /// separate, explicit action.
    pub fn decrease_qty(&self, item_id: &ItemId) {
        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|line| line.item_id() == item_id) {
                existing.quantity = existing.quantity.saturating_sub(1).max(1);
            }
        });
    }

    /// Remove an item entirely.
    pub fn remove_from_cart(&self, item_id: &ItemId) {
        self.mutate(|items| {
            items.retain(|line| line.item_id() != item_id);
        });
    }

    /// Remove every item.
    pub fn clear_cart(&self) {
        self.mutate(Vec::clear);
    }

    // =========================================================================
    // Orchestration
    // =========================================================================

    /// Run one state-machine step for the current identity and catalog.
    ///
    /// Called serially by the driver task, so loading phases never overlap.
    async fn evaluate(&self) {
        let identity = self.inner.identity.borrow().clone();
        let index = self.inner.catalog.borrow().clone();

        let transition = self.decide(&identity, &index);
        match transition {
            Transition::Stay => {}
            Transition::LoadGuest => self.load_guest(&index),
            Transition::LoadAuthenticated(auth) => self.load_authenticated(&auth, &index).await,
            Transition::Merge(auth) => self.merge_on_login(&auth, &index).await,
            Transition::SignOut => self.sign_out(),
        }
    }

    fn decide(&self, identity: &IdentityState, index: &CatalogIndex) -> Transition {
        let state = self.lock_state();
        match (&state.phase, identity) {
            (_, IdentityState::Unresolved) => Transition::Stay,

            // Hydration needs the catalog; an empty index means "not
            // loaded yet", not "cart empty", so wait.
            (CartPhase::Uninitialized, _) if index.is_empty() => Transition::Stay,

            (CartPhase::Uninitialized, IdentityState::Guest) => Transition::LoadGuest,
            (CartPhase::Uninitialized, IdentityState::Authenticated(auth)) => {
                Transition::LoadAuthenticated(auth.clone())
            }

            (CartPhase::Ready(CartContext::Guest), IdentityState::Authenticated(auth)) => {
                if state.items.is_empty() {
                    Transition::LoadAuthenticated(auth.clone())
                } else {
                    Transition::Merge(auth.clone())
                }
            }

            // Account switch without an intervening guest session.
            (
                CartPhase::Ready(CartContext::Authenticated(current)),
                IdentityState::Authenticated(auth),
            ) if *current != auth.identity_id => Transition::LoadAuthenticated(auth.clone()),

            (CartPhase::Ready(CartContext::Authenticated(_)), IdentityState::Guest) => {
                Transition::SignOut
            }

            _ => Transition::Stay,
        }
    }

    fn load_guest(&self, index: &CatalogIndex) {
        self.set_phase(CartPhase::LoadingGuest);

        let stored = self.inner.local.load().unwrap_or_else(|error| {
            warn!(%error, "local cart load failed, starting empty");
            Vec::new()
        });

        self.commit_loaded(stored, index, CartContext::Guest, false);
    }

    async fn load_authenticated(&self, auth: &AuthenticatedIdentity, index: &CatalogIndex) {
        self.set_phase(CartPhase::LoadingAuthenticated);

        match self.fetch_remote(auth).await {
            Ok(stored) => {
                self.commit_loaded(
                    stored,
                    index,
                    CartContext::Authenticated(auth.identity_id.clone()),
                    false,
                );
            }
            Err(error) => {
                // Never fall back to a cached local copy: a stale guest
                // cart must not be presented as this user's cart.
                warn!(%error, "remote cart load failed");
                self.commit_loaded(
                    Vec::new(),
                    index,
                    CartContext::Authenticated(auth.identity_id.clone()),
                    true,
                );
            }
        }
    }

    /// One-shot login reconciliation: remote fetch, quantity-sum merge,
    /// undebounced write-back, local record cleared.
    #[instrument(skip_all, fields(identity = %auth.identity_id))]
    async fn merge_on_login(&self, auth: &AuthenticatedIdentity, index: &CatalogIndex) {
        self.set_phase(CartPhase::Merging);

        let remote_items = match self.fetch_remote(auth).await {
            Ok(items) => items,
            Err(error) => {
                warn!(%error, "remote fetch failed during login merge");
                // The guest record stays in the local store so a later
                // load can retry the migration.
                self.commit_loaded(
                    Vec::new(),
                    index,
                    CartContext::Authenticated(auth.identity_id.clone()),
                    true,
                );
                return;
            }
        };

        {
            let mut state = self.lock_state();
            let max = self.inner.config.max_quantity;
            let local_items = codec::to_compact(&state.items, max);
            let merged = merge::merge(&local_items, &remote_items, max);
            let hydration = extended_index(&state.items, index);
            state.items = codec::from_compact(&merged, &hydration, max);
            state.phase = CartPhase::Ready(CartContext::Authenticated(auth.identity_id.clone()));
            state.load_failed = false;
            let write_back = codec::to_compact(&state.items, max);
            // Still under the state lock, so no mutation can interleave:
            // the guest-session local timer dies before the clear below,
            // and the merged snapshot supersedes any payload armed on the
            // remote lane while the fetch was in flight.
            self.inner.scheduler.cancel(SyncTarget::Local);
            self.inner.scheduler.prime(SyncTarget::Remote, write_back);
        }
        self.publish_snapshot();

        // Migration, not a routine edit: flushed immediately, not debounced.
        self.inner.scheduler.flush(SyncTarget::Remote).await;
        if let Err(error) = self.inner.local.clear() {
            warn!(%error, "failed to clear local cart after merge");
        }
    }

    fn sign_out(&self) {
        {
            let mut state = self.lock_state();
            state.items.clear();
            state.phase = CartPhase::Ready(CartContext::Guest);
            state.load_failed = false;
        }
        // Drop any writes scheduled for the departing identity and make
        // sure nothing of theirs leaks into the next guest session.
        self.inner.scheduler.dispose();
        if let Err(error) = self.inner.local.clear() {
            warn!(%error, "failed to clear local cart on sign-out");
        }
        self.publish_snapshot();
    }

    /// Commit a loaded compact list, folding in any edits made while the
    /// load was underway so they are not lost.
    fn commit_loaded(
        &self,
        loaded: Vec<CompactItem>,
        index: &CatalogIndex,
        context: CartContext,
        load_failed: bool,
    ) {
        let resync = {
            let mut state = self.lock_state();
            let max = self.inner.config.max_quantity;
            let hydration = extended_index(&state.items, index);
            let resync = if state.items.is_empty() {
                state.items = codec::from_compact(&loaded, &hydration, max);
                false
            } else {
                let pending = codec::to_compact(&state.items, max);
                let combined = merge::merge(&pending, &loaded, max);
                state.items = codec::from_compact(&combined, &hydration, max);
                true
            };
            state.phase = CartPhase::Ready(context);
            state.load_failed = load_failed;
            resync
        };
        self.publish_snapshot();
        if resync {
            self.schedule_sync();
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Apply a mutation to the live snapshot and schedule a durable write
    /// to the backend owned by the current identity. Never both.
    fn mutate<F: FnOnce(&mut Vec<LineItem>)>(&self, apply: F) {
        {
            let mut state = self.lock_state();
            apply(&mut state.items);
        }
        self.publish_snapshot();
        self.schedule_sync();
    }

    fn schedule_sync(&self) {
        let target = match &*self.inner.identity.borrow() {
            IdentityState::Authenticated(_) => SyncTarget::Remote,
            IdentityState::Guest | IdentityState::Unresolved => SyncTarget::Local,
        };
        // Scheduling under the state lock keeps snapshot and lane in step:
        // a login merge commits and re-arms its lanes under this same lock,
        // so a payload armed here is never stale relative to that commit.
        // Lock order is state then lanes, and neither is held across await.
        let state = self.lock_state();
        let compact = codec::to_compact(&state.items, self.inner.config.max_quantity);
        self.inner.scheduler.schedule(target, compact);
    }

    async fn resolve_one(&self, item_id: &ItemId) -> Option<CatalogRecord> {
        match self
            .inner
            .resolver
            .resolve_by_ids(std::slice::from_ref(item_id))
            .await
        {
            Ok(mut records) if !records.is_empty() => Some(records.remove(0)),
            Ok(_) => None,
            Err(error) => {
                warn!(item = %item_id, %error, "catalog resolution failed");
                None
            }
        }
    }

    async fn fetch_remote(
        &self,
        auth: &AuthenticatedIdentity,
    ) -> Result<Vec<CompactItem>, CartError> {
        let credential = auth.credential().await?;
        Ok(self.inner.remote.fetch(&credential).await?)
    }

    fn set_phase(&self, phase: CartPhase) {
        self.lock_state().phase = phase;
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        let snapshot = {
            let state = self.lock_state();
            CartSnapshot {
                items: state.items.clone(),
                ready: matches!(state.phase, CartPhase::Ready(_)),
                load_failed: state.load_failed,
            }
        };
        // send_replace, not send: the stored value must stay current even
        // while no receiver exists, so a late subscriber reads the live
        // snapshot rather than the initial default.
        self.inner.snapshot_tx.send_replace(snapshot);
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The catalog index extended with the snapshots already attached to live
/// items, so an item resolved on demand survives re-hydration.
fn extended_index(
    items: &[LineItem],
    index: &CatalogIndex,
) -> HashMap<ItemId, CatalogRecord> {
    let mut map = (**index).clone();
    for item in items {
        map.entry(item.item_id().clone())
            .or_insert_with(|| item.catalog.clone());
    }
    map
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use rust_decimal::dec;
    use secrecy::SecretString;
    use tokio::time::sleep;

    use sundry_core::{CurrencyCode, MAX_QUANTITY, Price};

    use crate::catalog::{CatalogHandle, StaticCatalogResolver};
    use crate::error::{RemoteCartError, StorageError};
    use crate::identity::{IdentityHandle, StaticCredentials};
    use crate::storage::MemoryLocalStorage;

    const DEBOUNCE: Duration = Duration::from_millis(400);

    fn record(id: &str) -> CatalogRecord {
        CatalogRecord {
            id: ItemId::new(id),
            name: format!("Item {id}"),
            price: Price::new(dec!(3.00), CurrencyCode::USD),
            image_url: None,
        }
    }

    fn compact(items: &[(&str, u32)]) -> Vec<CompactItem> {
        items
            .iter()
            .map(|(id, qty)| CompactItem::new(*id, *qty))
            .collect()
    }

    /// Remote backend fake recording every replace call.
    #[derive(Default)]
    struct FakeRemote {
        record: Mutex<Vec<CompactItem>>,
        writes: Mutex<Vec<Vec<CompactItem>>>,
        fail_fetch: AtomicBool,
        fetch_delay: Mutex<Option<Duration>>,
    }

    impl FakeRemote {
        fn seed(&self, items: Vec<CompactItem>) {
            *self.record.lock().unwrap() = items;
        }

        fn set_fetch_delay(&self, delay: Duration) {
            *self.fetch_delay.lock().unwrap() = Some(delay);
        }

        fn stored(&self) -> Vec<CompactItem> {
            self.record.lock().unwrap().clone()
        }

        fn writes(&self) -> Vec<Vec<CompactItem>> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteCartBackend for FakeRemote {
        async fn fetch(
            &self,
            _credential: &SecretString,
        ) -> Result<Vec<CompactItem>, RemoteCartError> {
            let delay = *self.fetch_delay.lock().unwrap();
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(RemoteCartError::Rejected {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(self.stored())
        }

        async fn replace(
            &self,
            _credential: &SecretString,
            items: &[CompactItem],
        ) -> Result<(), RemoteCartError> {
            self.writes.lock().unwrap().push(items.to_vec());
            *self.record.lock().unwrap() = items.to_vec();
            Ok(())
        }
    }

    /// Local store fake counting durable writes.
    #[derive(Default)]
    struct CountingLocal {
        inner: MemoryLocalStorage,
        stores: AtomicUsize,
    }

    impl LocalCartStorage for CountingLocal {
        fn load(&self) -> Result<Vec<CompactItem>, StorageError> {
            self.inner.load()
        }

        fn store(&self, items: &[CompactItem]) -> Result<(), StorageError> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            self.inner.store(items)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }
    }

    struct Harness {
        store: CartStore,
        identity: IdentityHandle,
        catalog: CatalogHandle,
        local: Arc<CountingLocal>,
        remote: Arc<FakeRemote>,
    }

    fn harness(catalog_ids: &[&str]) -> Harness {
        let (identity, identity_rx) = IdentityHandle::new();
        let (catalog, catalog_rx) = CatalogHandle::new();
        let local = Arc::new(CountingLocal::default());
        let remote = Arc::new(FakeRemote::default());
        let resolver = Arc::new(StaticCatalogResolver::new(
            catalog_ids.iter().map(|id| record(id)).collect(),
        ));

        let store = CartStore::new(CartStoreDeps {
            identity: identity_rx,
            catalog: catalog_rx,
            resolver,
            local: local.clone(),
            remote: remote.clone(),
            config: CartConfig::default(),
        });
        store.init();

        Harness {
            store,
            identity,
            catalog,
            local,
            remote,
        }
    }

    impl Harness {
        fn publish_catalog(&self, ids: &[&str]) {
            self.catalog.publish(ids.iter().map(|id| record(id)).collect());
        }

        fn sign_in(&self, id: &str) {
            self.identity
                .publish_authenticated(id, Arc::new(StaticCredentials::new("token")));
        }
    }

    /// Let the driver task and any due timers run (virtual time).
    async fn settle() {
        sleep(Duration::from_millis(5)).await;
    }

    /// Let a full debounce window elapse and its flush complete.
    async fn flush() {
        sleep(DEBOUNCE + Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_load_waits_for_catalog_index() {
        let h = harness(&["X1"]);
        h.local.inner.store(&compact(&[("X1", 2)])).unwrap();

        h.identity.publish_guest();
        settle().await;
        // Empty index means "catalog not loaded yet", not "cart empty".
        assert!(!h.store.is_ready());
        assert_eq!(h.store.phase(), CartPhase::Uninitialized);

        h.publish_catalog(&["X1"]);
        settle().await;
        assert!(h.store.is_ready());
        assert_eq!(h.store.total_item_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydration_drops_unknown_items_silently() {
        let h = harness(&["X1"]);
        h.local
            .inner
            .store(&compact(&[("X1", 1), ("DISCONTINUED", 4)]))
            .unwrap();

        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        let items = h.store.cart_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id(), &ItemId::new("X1"));
        assert_eq!(h.store.total_item_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_coalesces_to_one_local_write() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        let x1 = ItemId::new("X1");
        h.store.add_to_cart(&x1, 1).await;
        for _ in 0..9 {
            h.store.increase_qty(&x1);
        }
        flush().await;

        assert_eq!(h.local.stores.load(Ordering::SeqCst), 1);
        assert_eq!(h.local.inner.load().unwrap(), compact(&[("X1", 10)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quantity_clamped_before_persistence() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        let x1 = ItemId::new("X1");
        h.store.add_to_cart(&x1, 1).await;
        for _ in 0..150 {
            h.store.increase_qty(&x1);
        }
        flush().await;

        assert_eq!(h.store.total_item_count(), MAX_QUANTITY);
        assert_eq!(
            h.local.inner.load().unwrap(),
            compact(&[("X1", MAX_QUANTITY)])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_merge_sums_quantities_and_runs_once() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        h.store.add_to_cart(&ItemId::new("X1"), 1).await;
        h.store.add_to_cart(&ItemId::new("X1"), 2).await;
        flush().await;
        assert_eq!(h.local.inner.load().unwrap(), compact(&[("X1", 3)]));

        h.remote.seed(compact(&[("X1", 1)]));

        // Two rapid duplicate transition events must produce one merge.
        h.sign_in("u1");
        h.sign_in("u1");
        settle().await;

        assert_eq!(h.store.total_item_count(), 4);
        assert_eq!(h.remote.writes(), vec![compact(&[("X1", 4)])]);
        assert!(h.local.inner.raw().is_none());
        assert_eq!(
            h.store.phase(),
            CartPhase::Ready(CartContext::Authenticated(IdentityId::new("u1")))
        );

        // A later re-publish of the same identity must not merge again.
        h.sign_in("u1");
        settle().await;
        assert_eq!(h.remote.writes().len(), 1);
        assert_eq!(h.store.total_item_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_with_empty_cart_loads_remote_without_merge() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        h.remote.seed(compact(&[("X1", 2)]));
        h.sign_in("u1");
        settle().await;

        assert_eq!(h.store.total_item_count(), 2);
        assert!(h.remote.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_clears_memory_and_local_store() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        h.remote.seed(compact(&[("X1", 5)]));
        h.sign_in("u1");
        settle().await;
        assert_eq!(h.store.total_item_count(), 5);

        h.identity.publish_guest();
        settle().await;

        assert!(h.store.is_ready());
        assert_eq!(h.store.total_item_count(), 0);
        assert!(h.local.inner.raw().is_none());
        // The remote record belongs to the account, not the device.
        assert_eq!(h.remote.stored(), compact(&[("X1", 5)]));

        // A fresh guest session starts from zero, not the old account cart.
        h.store.add_to_cart(&ItemId::new("X1"), 1).await;
        flush().await;
        assert_eq!(h.local.inner.load().unwrap(), compact(&[("X1", 1)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_load_failure_leaves_empty_cart_with_flag() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.remote.fail_fetch.store(true, Ordering::SeqCst);

        h.sign_in("u1");
        settle().await;

        assert!(h.store.is_ready());
        assert_eq!(h.store.total_item_count(), 0);
        let snapshot = h.store.subscribe().borrow().clone();
        assert!(snapshot.load_failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_unknown_item_is_a_noop() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        h.store.add_to_cart(&ItemId::new("NOPE"), 1).await;
        flush().await;

        assert_eq!(h.store.total_item_count(), 0);
        assert_eq!(h.local.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_initialization_survives_hydration() {
        let h = harness(&["X1", "X2"]);
        h.local.inner.store(&compact(&[("X1", 2)])).unwrap();
        h.identity.publish_guest();
        settle().await;

        // Catalog still loading; the add resolves via the resolver and
        // must not be lost when hydration completes.
        h.store.add_to_cart(&ItemId::new("X2"), 1).await;
        assert_eq!(h.store.total_item_count(), 1);

        h.publish_catalog(&["X1", "X2"]);
        settle().await;

        assert!(h.store.is_ready());
        assert_eq!(h.store.total_item_count(), 3);

        flush().await;
        let stored = h.local.inner.load().unwrap();
        assert!(stored.contains(&CompactItem::new("X1", 2)));
        assert!(stored.contains(&CompactItem::new("X2", 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_route_to_the_current_backend_only() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.sign_in("u1");
        settle().await;

        h.store.add_to_cart(&ItemId::new("X1"), 2).await;
        flush().await;

        assert_eq!(h.remote.writes(), vec![compact(&[("X1", 2)])]);
        assert_eq!(h.local.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decrease_floors_at_one_and_remove_deletes() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        let x1 = ItemId::new("X1");
        h.store.add_to_cart(&x1, 2).await;
        h.store.decrease_qty(&x1);
        h.store.decrease_qty(&x1);
        h.store.decrease_qty(&x1);
        assert_eq!(h.store.total_item_count(), 1);

        h.store.remove_from_cart(&x1);
        assert_eq!(h.store.total_item_count(), 0);

        h.store.add_to_cart(&x1, 1).await;
        h.store.clear_cart();
        flush().await;
        assert!(h.local.inner.raw().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_merge_lands_in_final_remote_record() {
        let h = harness(&["X1", "X2"]);
        h.publish_catalog(&["X1", "X2"]);
        h.identity.publish_guest();
        settle().await;

        h.store.add_to_cart(&ItemId::new("X1"), 3).await;
        flush().await;
        assert_eq!(h.local.inner.load().unwrap(), compact(&[("X1", 3)]));

        h.remote.seed(compact(&[("X2", 5)]));
        h.remote.set_fetch_delay(Duration::from_millis(100));

        // The edit arrives while the merge fetch is still in flight. Its
        // debounced payload predates the merge and must never land after
        // the merged write-back.
        h.sign_in("u1");
        sleep(Duration::from_millis(10)).await;
        h.store.increase_qty(&ItemId::new("X1"));

        sleep(Duration::from_secs(2)).await;

        assert_eq!(h.store.total_item_count(), 9);
        let writes = h.remote.writes();
        assert_eq!(writes.len(), 1);
        let stored = h.remote.stored();
        assert!(stored.contains(&CompactItem::new("X1", 4)));
        assert!(stored.contains(&CompactItem::new("X2", 5)));
        assert!(h.local.inner.raw().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_cancels_pending_guest_write() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        // Sign in while the local debounce window is still open; the
        // guest-session timer must not resurrect the cleared local record.
        h.store.add_to_cart(&ItemId::new("X1"), 2).await;
        h.sign_in("u1");
        sleep(Duration::from_secs(2)).await;

        assert_eq!(h.local.stores.load(Ordering::SeqCst), 0);
        assert!(h.local.inner.raw().is_none());
        assert_eq!(h.remote.stored(), compact(&[("X1", 2)]));
        assert_eq!(h.store.total_item_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_sees_current_snapshot() {
        let h = harness(&["X1"]);
        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;
        h.store.add_to_cart(&ItemId::new("X1"), 2).await;

        // No receiver existed while the snapshots above were published;
        // a subscription opened only now must still read the live state.
        let late = h.store.subscribe();
        let snapshot = late.borrow().clone();
        assert!(snapshot.ready);
        assert_eq!(snapshot.total_item_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_subscription_reflects_readiness() {
        let h = harness(&["X1"]);
        let updates = h.store.subscribe();
        assert!(!updates.borrow().ready);

        h.publish_catalog(&["X1"]);
        h.identity.publish_guest();
        settle().await;

        let snapshot = updates.borrow().clone();
        assert!(snapshot.ready);
        assert!(!snapshot.load_failed);
        assert_eq!(snapshot.total_item_count(), 0);
    }
}
