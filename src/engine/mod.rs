//! Engine configuration and entry points
//!
//! # Overview
//!
//! [`Engine`] is the immutable configuration for a pagination run, built in
//! the usual chained style:
//!
//! ```rust,ignore
//! let engine = Engine::new(parser)
//!     .with_handler("accounts", accounts_fetcher)
//!     .with_handler("account_repos", repos_fetcher)
//!     .with_concurrency(8)
//!     .with_batcher(true, 16);
//!
//! let repos = engine.paginate_one(client, "account_repos", Some(id)).await?;
//! ```
//!
//! [`Engine::stream`] is the streaming core entry; `paginate`,
//! `paginate_coll` and `paginate_one` are collecting front-ends over it for
//! finite seed sets.

use crate::batch::{BatchKeyFn, Batcher};
use crate::error::Result;
use crate::executor::{FetchExecutor, TaskSpawner, TokioSpawner};
use crate::fetch::{Fetcher, HandlerRegistry};
use crate::paging::{EntityKey, PagingState};
use crate::parser::{ResultParser, SingleStateParser};
use crate::scheduler::{PageStream, Scheduler};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default in-flight batch cap
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// Default output (and input) channel capacity
pub const DEFAULT_RESULT_BUF: usize = 100;
/// Default maximum batch size
pub const DEFAULT_MAX_ITEMS: usize = 1;
/// Default interval after which a quiet scheduler flushes a partial batch
pub const DEFAULT_IDLE_FLUSH: Duration = Duration::from_millis(100);

/// Configuration for a pagination run.
///
/// Generic over the caller's params `P`, fetch response `R`, item `T` and
/// cursor `C`; all four are opaque to the scheduler. The engine is cheap to
/// clone and reusable: every [`stream`](Engine::stream) call starts an
/// independent run.
pub struct Engine<P, R, T, C> {
    parser: Arc<dyn ResultParser<R, T, C>>,
    fetcher: Option<Arc<dyn Fetcher<P, R, T, C>>>,
    handlers: HandlerRegistry<P, R, T, C>,
    spawner: Arc<dyn TaskSpawner>,
    max_concurrency: usize,
    result_buf: usize,
    sorted: bool,
    max_items: usize,
    batch_fn: Option<BatchKeyFn<T, C>>,
    idle_flush: Duration,
    ignore_spawns: bool,
}

impl<P, R, T, C> Clone for Engine<P, R, T, C> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
            fetcher: self.fetcher.clone(),
            handlers: self.handlers.clone(),
            spawner: Arc::clone(&self.spawner),
            max_concurrency: self.max_concurrency,
            result_buf: self.result_buf,
            sorted: self.sorted,
            max_items: self.max_items,
            batch_fn: self.batch_fn.clone(),
            idle_flush: self.idle_flush,
            ignore_spawns: self.ignore_spawns,
        }
    }
}

impl<P, R, T, C> Engine<P, R, T, C> {
    /// Create an engine around a result parser, with defaults everywhere
    /// else: per-entity-type handler dispatch, Tokio spawner, concurrency 1,
    /// batches of 1, unordered batching, 100-slot output buffer.
    pub fn new(parser: impl ResultParser<R, T, C> + 'static) -> Self {
        Self {
            parser: Arc::new(parser),
            fetcher: None,
            handlers: HandlerRegistry::new(),
            spawner: Arc::new(TokioSpawner),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            result_buf: DEFAULT_RESULT_BUF,
            sorted: false,
            max_items: DEFAULT_MAX_ITEMS,
            batch_fn: None,
            idle_flush: DEFAULT_IDLE_FLUSH,
            ignore_spawns: false,
        }
    }

    /// Use one monolithic fetch function for every batch, bypassing the
    /// handler registry.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: impl Fetcher<P, R, T, C> + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Register a fetch handler for one entity type (the default dispatch
    /// mode). Ignored if a monolithic fetcher is set.
    #[must_use]
    pub fn with_handler(
        mut self,
        entity_type: impl Into<String>,
        handler: impl Fetcher<P, R, T, C> + 'static,
    ) -> Self {
        self.handlers.register(entity_type, handler);
        self
    }

    /// Replace the task spawner (default: the ambient Tokio runtime)
    #[must_use]
    pub fn with_spawner(mut self, spawner: impl TaskSpawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Set the maximum number of concurrently in-flight batches (clamped to
    /// at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Set the output channel capacity; a slow output consumer stalls
    /// dispatch once this many states are buffered
    #[must_use]
    pub fn with_result_buf(mut self, result_buf: usize) -> Self {
        self.result_buf = result_buf.max(1);
        self
    }

    /// Configure batching: `sorted` makes dispatch order deterministic
    /// (smallest batch key first), `max_items` is the batch size at which a
    /// batch dispatches without waiting for the idle flush.
    #[must_use]
    pub fn with_batcher(mut self, sorted: bool, max_items: usize) -> Self {
        self.sorted = sorted;
        self.max_items = max_items.max(1);
        self
    }

    /// Replace the batch key function (default: the state's entity type)
    #[must_use]
    pub fn with_batch_fn<F>(mut self, batch_fn: F) -> Self
    where
        F: Fn(&PagingState<T, C>) -> String + Send + Sync + 'static,
    {
        self.batch_fn = Some(Arc::new(batch_fn));
        self
    }

    /// Set the idle interval after which a partial batch is force-flushed
    #[must_use]
    pub fn with_idle_flush(mut self, idle_flush: Duration) -> Self {
        self.idle_flush = idle_flush;
        self
    }

    /// Configured concurrency cap
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Configured output buffer capacity
    pub fn result_buf(&self) -> usize {
        self.result_buf
    }

    /// Whether the batcher dispatches in sorted key order
    pub fn sorted(&self) -> bool {
        self.sorted
    }

    /// Configured maximum batch size
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Configured idle-flush interval
    pub fn idle_flush(&self) -> Duration {
        self.idle_flush
    }
}

impl<P, R, T, C> Engine<P, R, T, C>
where
    P: Send + Sync + 'static,
    R: Send + Sync + 'static,
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Replace the parser with the "one fetch per state" convenience: items
    /// come from `items_of`, and pagination always ends after the first
    /// page.
    #[must_use]
    pub fn with_items_fn<F>(mut self, items_of: F) -> Self
    where
        F: Fn(&R) -> Result<Vec<T>> + Send + Sync + 'static,
    {
        self.parser = Arc::new(SingleStateParser::new(items_of, |_: &R| Ok(None)));
        self
    }

    /// Start a pagination run: spawn the scheduler and hand back its input
    /// and output channels.
    ///
    /// Both channels use the `result_buf` capacity. The run ends, closing
    /// the output stream, once every clone of the input sender has been
    /// dropped and all live states have been emitted.
    pub fn stream(&self, params: P) -> PageStream<T, C> {
        let (input_tx, input_rx) = mpsc::channel(self.result_buf);
        let (output_tx, output_rx) = mpsc::channel(self.result_buf);
        let (completion_tx, completion_rx) = mpsc::channel(self.max_concurrency);

        let fetcher = self
            .fetcher
            .clone()
            .unwrap_or_else(|| Arc::new(self.handlers.clone()) as Arc<dyn Fetcher<P, R, T, C>>);
        let batch_fn = self.batch_fn.clone().unwrap_or_else(|| {
            Arc::new(|state: &PagingState<T, C>| state.entity_type().to_string())
        });

        let scheduler = Scheduler {
            batcher: Batcher::new(self.sorted, self.max_items, batch_fn),
            executor: FetchExecutor::new(
                fetcher,
                Arc::clone(&self.spawner),
                Arc::new(params),
                completion_tx,
                self.max_concurrency,
            ),
            parser: Arc::clone(&self.parser),
            output: output_tx,
            idle_flush: self.idle_flush,
            ignore_spawns: self.ignore_spawns,
            live: HashSet::new(),
        };
        self.spawner
            .spawn(Box::pin(scheduler.run(input_rx, completion_rx)));

        PageStream {
            input: input_tx,
            output: output_rx,
        }
    }

    /// Run the seeds to completion and collect every emitted state.
    ///
    /// Returns the first stored error if any emitted state failed, in
    /// output order; otherwise all terminal states, one per seed plus any
    /// spawned states.
    pub async fn paginate(
        &self,
        params: P,
        seeds: impl IntoIterator<Item = EntityKey>,
    ) -> Result<Vec<PagingState<T, C>>> {
        let stream = self.stream(params);
        let seeds: Vec<EntityKey> = seeds.into_iter().collect();

        // Feed seeds from a task of their own so output drains while
        // seeding; a seed list larger than the channel buffers must not
        // deadlock the collection loop below.
        let feeder_input = stream.input.clone();
        self.spawner.spawn(Box::pin(async move {
            for key in seeds {
                if feeder_input.send(PagingState::for_key(key)).await.is_err() {
                    tracing::warn!("scheduler stopped while seeds were being queued");
                    break;
                }
            }
        }));

        let PageStream { input, mut output } = stream;
        drop(input);

        let mut states = Vec::new();
        while let Some(state) = output.recv().await {
            states.push(state);
        }

        if let Some(error) = states.iter().find_map(|state| state.error().cloned()) {
            return Err(error);
        }
        Ok(states)
    }

    /// Fully enumerate one collection per id, all of one entity type.
    ///
    /// Returns one items vector per id, in input id order. Spawned states
    /// are not scheduled and do not appear in the result.
    pub async fn paginate_coll(
        &self,
        params: P,
        entity_type: impl Into<String>,
        ids: impl IntoIterator<Item = Option<String>>,
    ) -> Result<Vec<Vec<T>>> {
        let entity_type = entity_type.into();
        let keys: Vec<EntityKey> = ids
            .into_iter()
            .map(|id| EntityKey {
                entity_type: entity_type.clone(),
                id,
            })
            .collect();

        let mut engine = self.clone();
        engine.ignore_spawns = true;
        let states = engine.paginate(params, keys.clone()).await?;

        let mut by_key: HashMap<EntityKey, Vec<T>> = states
            .into_iter()
            .map(|state| (state.key(), state.into_items()))
            .collect();
        Ok(keys
            .into_iter()
            .map(|key| by_key.remove(&key).unwrap_or_default())
            .collect())
    }

    /// Fully enumerate a single collection and return its items
    pub async fn paginate_one(
        &self,
        params: P,
        entity_type: impl Into<String>,
        id: Option<String>,
    ) -> Result<Vec<T>> {
        let mut collections = self.paginate_coll(params, entity_type, [id]).await?;
        Ok(collections.pop().unwrap_or_default())
    }
}
