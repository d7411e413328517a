//! Debounced, per-backend serialized persistence scheduling.
//!
//! A burst of mutations produces exactly one durable write carrying the
//! snapshot current at flush time, never an intermediate one. Each backend
//! lane allows at most one write in flight; a flush arriving mid-write is
//! queued and issued on completion, again carrying the then-latest payload.
//! Write failures are logged and never retried automatically - the next
//! mutation schedules a fresh write of the now-current state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::warn;

use sundry_core::CompactItem;

use crate::error::CartError;

/// Which durable backend a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    /// The guest-owned local store.
    Local,
    /// The authenticated remote cart record.
    Remote,
}

/// Destination for flushed snapshots.
///
/// Implemented by the cart store, which routes each target to its adapter.
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    /// Durably persist a full compact snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`]; the scheduler logs it and moves on.
    async fn persist(&self, target: SyncTarget, items: Vec<CompactItem>) -> Result<(), CartError>;
}

/// State of one backend lane.
#[derive(Default)]
struct Lane {
    /// Latest scheduled payload; replaced on every re-arm.
    pending: Option<Vec<CompactItem>>,
    /// Armed debounce timer, if any.
    timer: Option<JoinHandle<()>>,
    /// A write is currently being issued on this lane.
    in_flight: bool,
    /// A flush fired while a write was in flight.
    queued: bool,
}

impl Lane {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Lanes {
    local: Lane,
    remote: Lane,
}

impl Lanes {
    fn lane_mut(&mut self, target: SyncTarget) -> &mut Lane {
        match target {
            SyncTarget::Local => &mut self.local,
            SyncTarget::Remote => &mut self.remote,
        }
    }
}

struct SchedulerInner {
    debounce: Duration,
    writer: Arc<dyn SnapshotWriter>,
    lanes: Mutex<Lanes>,
}

/// Debounced write scheduler with one lane per backend.
///
/// Cheaply cloneable; clones share the same lanes.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// Create a scheduler flushing into `writer` after `debounce` of quiet.
    #[must_use]
    pub fn new(debounce: Duration, writer: Arc<dyn SnapshotWriter>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                debounce,
                writer,
                lanes: Mutex::new(Lanes::default()),
            }),
        }
    }

    fn lanes(&self) -> MutexGuard<'_, Lanes> {
        self.inner
            .lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arm the lane's debounce timer with the latest payload.
    ///
    /// Any previously armed timer for the lane is cancelled; its payload is
    /// superseded, not flushed.
    pub fn schedule(&self, target: SyncTarget, items: Vec<CompactItem>) {
        let mut lanes = self.lanes();
        let lane = lanes.lane_mut(target);
        lane.pending = Some(items);
        lane.disarm();

        let scheduler = self.clone();
        let debounce = self.inner.debounce;
        lane.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            scheduler.flush(target).await;
        }));
    }

    /// Replace the lane's pending payload and disarm its timer without
    /// flushing. Pair with [`SyncScheduler::flush`] for an immediate,
    /// still-serialized write that supersedes anything the lane had armed.
    pub fn prime(&self, target: SyncTarget, items: Vec<CompactItem>) {
        let mut lanes = self.lanes();
        let lane = lanes.lane_mut(target);
        lane.pending = Some(items);
        lane.disarm();
    }

    /// Drop the lane's pending payload and disarm its timer.
    ///
    /// An already in-flight write cannot be cancelled; its result is
    /// advisory only.
    pub fn cancel(&self, target: SyncTarget) {
        let mut lanes = self.lanes();
        let lane = lanes.lane_mut(target);
        lane.pending = None;
        lane.queued = false;
        lane.disarm();
    }

    /// Flush the lane's pending payload now, serializing against any
    /// in-flight write: if one is running, the flush is queued and issued on
    /// completion carrying the then-latest payload.
    pub async fn flush(&self, target: SyncTarget) {
        let payload = {
            let mut lanes = self.lanes();
            let lane = lanes.lane_mut(target);
            lane.timer = None;
            if lane.in_flight {
                lane.queued = true;
                return;
            }
            let Some(items) = lane.pending.take() else {
                return;
            };
            lane.in_flight = true;
            items
        };

        self.write_serialized(target, payload).await;
    }

    /// Issue writes until the lane is drained, one at a time.
    async fn write_serialized(&self, target: SyncTarget, first: Vec<CompactItem>) {
        let mut payload = first;
        loop {
            if let Err(error) = self.inner.writer.persist(target, payload).await {
                warn!(?target, %error, "durable cart write failed");
            }

            let next = {
                let mut lanes = self.lanes();
                let lane = lanes.lane_mut(target);
                let next = if lane.queued { lane.pending.take() } else { None };
                lane.queued = false;
                if next.is_none() {
                    lane.in_flight = false;
                }
                next
            };

            match next {
                Some(items) => payload = items,
                None => return,
            }
        }
    }

    /// Cancel armed timers and drop pending payloads on both lanes.
    pub fn dispose(&self) {
        self.cancel(SyncTarget::Local);
        self.cancel(SyncTarget::Remote);
    }
}
