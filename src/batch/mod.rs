//! Batching of paging states
//!
//! Groups states that are ready for (another) fetch into batches by a
//! caller-supplied key, and hands complete batches back to the scheduler.
//!
//! # Overview
//!
//! The [`Batcher`] keeps one open (`Forming`) batch per key. A batch is
//! promoted to `Ready` when it reaches `max_items`, or when the scheduler
//! forces a flush after an idle interval. In sorted mode the batcher is
//! deterministic: the smallest key wins both for popping ready batches and
//! for forced flushes.

use crate::paging::PagingState;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Function computing the batch key for a state. States with equal keys are
/// grouped into the same batch.
pub type BatchKeyFn<T, C> = Arc<dyn Fn(&PagingState<T, C>) -> String + Send + Sync>;

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Accepting members, below `max_items`
    Forming,
    /// Complete (or force-flushed) and waiting for dispatch
    Ready,
    /// Submitted to the fetch executor
    InFlight,
}

/// A group of paging states sharing a batch key, sent together to one
/// fetch call. Member order follows insertion order.
#[derive(Debug)]
pub struct Batch<T, C> {
    key: String,
    members: Vec<PagingState<T, C>>,
    status: BatchStatus,
}

impl<T, C> Batch<T, C> {
    fn new(key: String) -> Self {
        Self {
            key,
            members: Vec::new(),
            status: BatchStatus::Forming,
        }
    }

    /// The batch key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Members in insertion order
    pub fn members(&self) -> &[PagingState<T, C>] {
        &self.members
    }

    /// Consume the batch, yielding its members
    pub fn into_members(self) -> Vec<PagingState<T, C>> {
        self.members
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check whether the batch has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current lifecycle status
    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: BatchStatus) {
        self.status = status;
    }
}

/// Groups pending paging states into batches by key.
///
/// Forming batches are keyed in a `BTreeMap` so the smallest key is always
/// cheap to find; ready batches queue in promotion order.
pub struct Batcher<T, C> {
    sorted: bool,
    max_items: usize,
    batch_fn: BatchKeyFn<T, C>,
    forming: BTreeMap<String, Batch<T, C>>,
    ready: VecDeque<Batch<T, C>>,
}

impl<T, C> Batcher<T, C> {
    /// Create a batcher. `max_items` is clamped to at least 1.
    pub fn new(sorted: bool, max_items: usize, batch_fn: BatchKeyFn<T, C>) -> Self {
        Self {
            sorted,
            max_items: max_items.max(1),
            batch_fn,
            forming: BTreeMap::new(),
            ready: VecDeque::new(),
        }
    }

    /// Add a state to the open batch for its key, promoting the batch to
    /// `Ready` when it reaches `max_items`.
    pub fn add(&mut self, state: PagingState<T, C>) {
        let key = (self.batch_fn)(&state);
        let batch = self
            .forming
            .entry(key.clone())
            .or_insert_with(|| Batch::new(key.clone()));
        batch.members.push(state);

        if batch.members.len() >= self.max_items {
            let mut batch = self.forming.remove(&key).expect("forming batch exists");
            batch.set_status(BatchStatus::Ready);
            self.ready.push_back(batch);
        }
    }

    /// Remove and return a ready batch, if any. Sorted mode returns the
    /// smallest-keyed ready batch; unordered mode returns them in promotion
    /// order.
    pub fn pop_ready(&mut self) -> Option<Batch<T, C>> {
        if !self.sorted {
            return self.ready.pop_front();
        }

        // First batch with the smallest key, so equal keys stay FIFO
        let mut smallest: Option<usize> = None;
        for (index, batch) in self.ready.iter().enumerate() {
            if smallest.map_or(true, |best| batch.key < self.ready[best].key) {
                smallest = Some(index);
            }
        }
        self.ready.remove(smallest?)
    }

    /// Promote exactly one non-empty forming batch to `Ready`: the
    /// smallest-keyed one in sorted mode, otherwise the first in key order.
    /// Returns false if nothing was forming.
    pub fn force_flush(&mut self) -> bool {
        let Some(key) = self.forming.keys().next().cloned() else {
            return false;
        };
        let mut batch = self.forming.remove(&key).expect("forming batch exists");
        batch.set_status(BatchStatus::Ready);
        self.ready.push_back(batch);
        true
    }

    /// Check whether no batches contain any members
    pub fn is_empty(&self) -> bool {
        self.forming.is_empty() && self.ready.is_empty()
    }

    /// Check whether any forming batch exists (the idle-flush precondition)
    pub fn has_forming(&self) -> bool {
        !self.forming.is_empty()
    }

    /// Total number of states held across forming and ready batches
    pub fn len(&self) -> usize {
        self.forming.values().map(Batch::len).sum::<usize>()
            + self.ready.iter().map(Batch::len).sum::<usize>()
    }
}
