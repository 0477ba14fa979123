//! Bounded-parallelism fetch execution
//!
//! Runs the caller's fetch function as independent tasks on a pluggable
//! spawner, capped at `max_concurrency` in-flight batches. Each task posts
//! its outcome back to the scheduler as a [`Completion`] event, success or
//! failure.

use crate::batch::{Batch, BatchStatus};
use crate::error::Result;
use crate::fetch::Fetcher;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How fetch tasks (and the coordinator itself) are executed.
///
/// The default [`TokioSpawner`] hands futures to the ambient Tokio runtime;
/// supply an alternative to pin work to a dedicated runtime or executor.
pub trait TaskSpawner: Send + Sync {
    /// Start the task in the background
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawn tasks onto the ambient Tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

/// Outcome of one in-flight batch: the batch comes back with either the
/// fetch response or the error that ended it.
#[derive(Debug)]
pub struct Completion<R, T, C> {
    /// The batch that was fetched, members unchanged
    pub batch: Batch<T, C>,
    /// The fetch function's response, or its error
    pub outcome: Result<R>,
}

/// Bounded-concurrency runner for the user's fetch function.
///
/// Owned by the scheduler's coordinator task; the in-flight count is
/// incremented by [`try_submit`](FetchExecutor::try_submit) and decremented
/// by [`on_complete`](FetchExecutor::on_complete) when the corresponding
/// completion event is received.
pub struct FetchExecutor<P, R, T, C> {
    fetcher: Arc<dyn Fetcher<P, R, T, C>>,
    spawner: Arc<dyn TaskSpawner>,
    params: Arc<P>,
    completions: mpsc::Sender<Completion<R, T, C>>,
    max_concurrency: usize,
    in_flight: usize,
}

impl<P, R, T, C> FetchExecutor<P, R, T, C>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Create an executor. `max_concurrency` is clamped to at least 1.
    pub fn new(
        fetcher: Arc<dyn Fetcher<P, R, T, C>>,
        spawner: Arc<dyn TaskSpawner>,
        params: Arc<P>,
        completions: mpsc::Sender<Completion<R, T, C>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            spawner,
            params,
            completions,
            max_concurrency,
            in_flight: 0,
        }
    }

    /// Start fetching a batch if the concurrency cap permits.
    ///
    /// Returns false (and gives the batch back) when at capacity.
    pub fn try_submit(&mut self, batch: Batch<T, C>) -> std::result::Result<(), Batch<T, C>> {
        if self.in_flight >= self.max_concurrency {
            return Err(batch);
        }
        self.in_flight += 1;

        let mut batch = batch;
        batch.set_status(BatchStatus::InFlight);
        tracing::debug!(key = %batch.key(), members = batch.len(), "dispatching batch");

        let fetcher = Arc::clone(&self.fetcher);
        let params = Arc::clone(&self.params);
        let completions = self.completions.clone();
        self.spawner.spawn(Box::pin(async move {
            let outcome = fetcher.fetch(&params, batch.members()).await;
            if completions.send(Completion { batch, outcome }).await.is_err() {
                tracing::warn!("scheduler stopped before batch completion could be delivered");
            }
        }));
        Ok(())
    }

    /// Current number of in-flight batches
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Check whether another batch may be submitted
    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.max_concurrency
    }

    /// Record that a completion event for one batch was received
    pub fn on_complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests;
