//! Scheduler coordinator loop
//!
//! The central single-writer loop. One coordinator task owns the batcher,
//! the executor's in-flight accounting, and the output channel; it
//! multiplexes three event sources (new input states, batch completions,
//! and an idle timer) and is the only place paging states are advanced.
//!
//! # Overview
//!
//! Per iteration the coordinator dispatches as many ready batches as the
//! concurrency cap allows, then waits for the next event:
//!
//! - an input state is routed into the batcher;
//! - a completion is parsed, every member state advanced (or failed) and
//!   either re-batched for its next page or emitted;
//! - the idle timer forces one partial batch out so slow or exhausted
//!   input cannot starve forming batches forever.
//!
//! The loop exits when input is closed, the batcher is empty and nothing
//! is in flight; dropping the output sender then closes the output stream.

use crate::batch::Batcher;
use crate::executor::{Completion, FetchExecutor};
use crate::paging::{EntityKey, PagingState};
use crate::parser::ResultParser;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The streaming entry's handle pair: feed states in, read terminal states
/// out.
///
/// Dropping (all clones of) `input` closes the input stream; the scheduler
/// then terminates once every live state has been emitted, which closes
/// `output`. If `input` is never dropped the run never terminates, by
/// design.
pub struct PageStream<T, C> {
    /// Send new paging states into the scheduler
    pub input: mpsc::Sender<PagingState<T, C>>,
    /// Receive terminal paging states, one per completed entity
    pub output: mpsc::Receiver<PagingState<T, C>>,
}

pub(crate) struct Scheduler<P, R, T, C> {
    pub(crate) batcher: Batcher<T, C>,
    pub(crate) executor: FetchExecutor<P, R, T, C>,
    pub(crate) parser: Arc<dyn ResultParser<R, T, C>>,
    pub(crate) output: mpsc::Sender<PagingState<T, C>>,
    pub(crate) idle_flush: Duration,
    pub(crate) ignore_spawns: bool,
    /// Keys of states currently queued or in flight; spawns colliding with
    /// a live key are dropped.
    pub(crate) live: HashSet<EntityKey>,
}

impl<P, R, T, C> Scheduler<P, R, T, C>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Drive the loop until input is closed and all work has drained, or
    /// until the output receiver goes away.
    pub(crate) async fn run(
        mut self,
        mut input: mpsc::Receiver<PagingState<T, C>>,
        mut completions: mpsc::Receiver<Completion<R, T, C>>,
    ) {
        let mut input_open = true;
        loop {
            self.dispatch_ready();

            if !input_open && self.batcher.is_empty() && self.executor.in_flight() == 0 {
                break;
            }

            let can_flush = self.executor.has_capacity() && self.batcher.has_forming();
            tokio::select! {
                received = input.recv(), if input_open => match received {
                    Some(state) => {
                        if !self.route(state).await {
                            return;
                        }
                    }
                    None => {
                        tracing::debug!("input stream closed");
                        input_open = false;
                    }
                },
                Some(completion) = completions.recv() => {
                    if !self.apply_completion(completion).await {
                        return;
                    }
                }
                () = tokio::time::sleep(self.idle_flush), if can_flush => {
                    tracing::debug!("idle flush of a forming batch");
                    self.batcher.force_flush();
                }
            }
        }
        tracing::debug!("scheduler drained; closing output");
    }

    /// Submit ready batches while the concurrency cap permits
    fn dispatch_ready(&mut self) {
        while self.executor.has_capacity() {
            let Some(batch) = self.batcher.pop_ready() else {
                break;
            };
            if let Err(batch) = self.executor.try_submit(batch) {
                // Cannot happen after the capacity check; states must not be lost
                tracing::warn!(key = %batch.key(), "submit rejected at capacity");
                for state in batch.into_members() {
                    self.batcher.add(state);
                }
                break;
            }
        }
    }

    /// Put a state where it belongs: terminal states go straight to output,
    /// everything else into the batcher. Returns false if output is gone.
    async fn route(&mut self, state: PagingState<T, C>) -> bool {
        if state.is_terminal() {
            return self.emit(state).await;
        }
        tracing::trace!(key = %state.key(), "state queued for batching");
        self.live.insert(state.key());
        self.batcher.add(state);
        true
    }

    /// Apply one batch completion: parse, advance or fail every member,
    /// re-batch or emit each, then admit spawned states. Returns false if
    /// output is gone.
    async fn apply_completion(&mut self, completion: Completion<R, T, C>) -> bool {
        self.executor.on_complete();
        let Completion { batch, outcome } = completion;

        let parsed = outcome.and_then(|response| self.parser.parse(&response, batch.members()));
        let mut parsed = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(key = %batch.key(), error = %error, "batch failed");
                for mut state in batch.into_members() {
                    state.fail(error.clone());
                    if !self.emit(state).await {
                        return false;
                    }
                }
                return true;
            }
        };

        for mut state in batch.into_members() {
            // A state the parser did not mention gets no items and no
            // further pages.
            match parsed.updates.remove(&state.key()) {
                Some(update) => state.advance(update.items, update.cursor),
                None => state.advance(Vec::new(), None),
            }
            if state.is_terminal() {
                if !self.emit(state).await {
                    return false;
                }
            } else {
                self.batcher.add(state);
            }
        }

        if self.ignore_spawns {
            if !parsed.spawned.is_empty() {
                tracing::trace!(count = parsed.spawned.len(), "spawned states ignored");
            }
            return true;
        }
        for spawn in parsed.spawned {
            let key = spawn.key();
            if self.live.contains(&key) {
                tracing::debug!(key = %key, "spawn collides with a live state; ignored");
                continue;
            }
            if !self.route(spawn).await {
                return false;
            }
        }
        true
    }

    /// Send a terminal state to output. Returns false when the receiver has
    /// been dropped, which stops the run; remaining states are discarded.
    async fn emit(&mut self, state: PagingState<T, C>) -> bool {
        self.live.remove(&state.key());
        tracing::trace!(
            key = %state.key(),
            pages = state.pages(),
            failed = state.is_failed(),
            "state emitted"
        );
        if self.output.send(state).await.is_err() {
            tracing::warn!("output receiver dropped; stopping scheduler");
            return false;
        }
        true
    }
}
