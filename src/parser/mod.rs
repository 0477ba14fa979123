//! Result parsing
//!
//! Contract the caller implements to turn one fetch response into paging
//! progress: new items per state, the next cursor per state, and any new
//! paging states to spawn into the scheduler.
//!
//! # Overview
//!
//! A [`ResultParser`] receives the raw response together with the batch of
//! states that was sent, and returns a [`ParsedBatch`]: per-state updates
//! keyed by [`EntityKey`] plus a spawn set. Two convenience builders cover
//! the common shapes:
//!
//! - [`SingleStateParser`] for APIs fetched one state at a time, built from
//!   `items_of` / `cursor_of` extractors.
//! - [`MultiStateParser`] for batched APIs whose response addresses several
//!   states at once.

use crate::error::{Error, Result};
use crate::paging::{EntityKey, PagingState};
use std::collections::HashMap;

/// Items and next cursor for one state after one fetch
#[derive(Debug, Clone)]
pub struct PageUpdate<T, C> {
    /// New items to append this round
    pub items: Vec<T>,
    /// Cursor for the next page; `None` means no further pages
    pub cursor: Option<C>,
}

/// Everything the parser extracted from one response
#[derive(Debug)]
pub struct ParsedBatch<T, C> {
    /// Per-state updates. A state missing from the map gets no items and no
    /// further pages.
    pub updates: HashMap<EntityKey, PageUpdate<T, C>>,
    /// New paging states to inject into the scheduler
    pub spawned: Vec<PagingState<T, C>>,
}

impl<T, C> ParsedBatch<T, C> {
    /// Create an empty parsed batch
    pub fn new() -> Self {
        Self {
            updates: HashMap::new(),
            spawned: Vec::new(),
        }
    }

    /// Record the update for one state
    #[must_use]
    pub fn update(mut self, key: EntityKey, items: Vec<T>, cursor: Option<C>) -> Self {
        self.updates.insert(key, PageUpdate { items, cursor });
        self
    }

    /// Add a spawned state
    #[must_use]
    pub fn spawn(mut self, state: PagingState<T, C>) -> Self {
        self.spawned.push(state);
        self
    }
}

impl<T, C> Default for ParsedBatch<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// One state's worth of extraction from a multi-state response
#[derive(Debug, Clone)]
pub struct StateUpdate<T, C> {
    /// Entity type of the addressed state
    pub entity_type: String,
    /// Entity id of the addressed state
    pub id: Option<String>,
    /// New items to append
    pub items: Vec<T>,
    /// Cursor for the next page; `None` means no further pages
    pub cursor: Option<C>,
}

impl<T, C> StateUpdate<T, C> {
    /// Create a state update
    pub fn new(
        entity_type: impl Into<String>,
        id: Option<String>,
        items: Vec<T>,
        cursor: Option<C>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            items,
            cursor,
        }
    }

    fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type.clone(),
            id: self.id.clone(),
        }
    }
}

/// Contract for extracting paging progress from a fetch response.
///
/// Implementations must be cheap and synchronous; parsing runs on the
/// scheduler's coordinator task.
pub trait ResultParser<R, T, C>: Send + Sync {
    /// Parse one response against the batch of states that was sent
    fn parse(&self, response: &R, batch: &[PagingState<T, C>]) -> Result<ParsedBatch<T, C>>;
}

type ItemsFn<R, T> = Box<dyn Fn(&R) -> Result<Vec<T>> + Send + Sync>;
type CursorFn<R, C> = Box<dyn Fn(&R) -> Result<Option<C>> + Send + Sync>;
type SpawnsFn<R, T, C> = Box<dyn Fn(&R) -> Result<Vec<PagingState<T, C>>> + Send + Sync>;
type StatesFn<R, T, C> = Box<dyn Fn(&R) -> Result<Vec<StateUpdate<T, C>>> + Send + Sync>;

/// Parser for batches of exactly one state.
///
/// Built from an `items_of` and a `cursor_of` extractor; both apply to the
/// single state in the batch. Parsing a batch with more than one member
/// fails with [`Error::InvalidBatchSize`], so keep the batcher at
/// `max_items = 1` (the default) when using this parser.
pub struct SingleStateParser<R, T, C> {
    items_of: ItemsFn<R, T>,
    cursor_of: CursorFn<R, C>,
    spawns_of: Option<SpawnsFn<R, T, C>>,
}

impl<R, T, C> SingleStateParser<R, T, C> {
    /// Create a parser from items and cursor extractors
    pub fn new<I, N>(items_of: I, cursor_of: N) -> Self
    where
        I: Fn(&R) -> Result<Vec<T>> + Send + Sync + 'static,
        N: Fn(&R) -> Result<Option<C>> + Send + Sync + 'static,
    {
        Self {
            items_of: Box::new(items_of),
            cursor_of: Box::new(cursor_of),
            spawns_of: None,
        }
    }

    /// Add a spawn extractor
    #[must_use]
    pub fn with_spawns<S>(mut self, spawns_of: S) -> Self
    where
        S: Fn(&R) -> Result<Vec<PagingState<T, C>>> + Send + Sync + 'static,
    {
        self.spawns_of = Some(Box::new(spawns_of));
        self
    }
}

impl<R, T, C> ResultParser<R, T, C> for SingleStateParser<R, T, C>
where
    R: Send + Sync,
    T: Send + Sync,
    C: Send + Sync,
{
    fn parse(&self, response: &R, batch: &[PagingState<T, C>]) -> Result<ParsedBatch<T, C>> {
        let [state] = batch else {
            return Err(Error::invalid_batch_size(batch.len()));
        };

        let mut parsed = ParsedBatch::new().update(
            state.key(),
            (self.items_of)(response)?,
            (self.cursor_of)(response)?,
        );
        if let Some(spawns_of) = &self.spawns_of {
            parsed.spawned = spawns_of(response)?;
        }
        Ok(parsed)
    }
}

/// Parser for responses that address several states at once.
///
/// Built from a `states_of` extractor yielding one [`StateUpdate`] per
/// state the response mentions. Batch members the response does not mention
/// implicitly get no items and no further pages.
pub struct MultiStateParser<R, T, C> {
    states_of: StatesFn<R, T, C>,
    spawns_of: Option<SpawnsFn<R, T, C>>,
}

impl<R, T, C> MultiStateParser<R, T, C> {
    /// Create a parser from a per-state extractor
    pub fn new<S>(states_of: S) -> Self
    where
        S: Fn(&R) -> Result<Vec<StateUpdate<T, C>>> + Send + Sync + 'static,
    {
        Self {
            states_of: Box::new(states_of),
            spawns_of: None,
        }
    }

    /// Add a spawn extractor
    #[must_use]
    pub fn with_spawns<S>(mut self, spawns_of: S) -> Self
    where
        S: Fn(&R) -> Result<Vec<PagingState<T, C>>> + Send + Sync + 'static,
    {
        self.spawns_of = Some(Box::new(spawns_of));
        self
    }
}

impl<R, T, C> ResultParser<R, T, C> for MultiStateParser<R, T, C>
where
    R: Send + Sync,
    T: Send + Sync,
    C: Send + Sync,
{
    fn parse(&self, response: &R, _batch: &[PagingState<T, C>]) -> Result<ParsedBatch<T, C>> {
        let mut parsed = ParsedBatch::new();
        for update in (self.states_of)(response)? {
            parsed = parsed.update(
                update.key(),
                update.items,
                update.cursor,
            );
        }
        if let Some(spawns_of) = &self.spawns_of {
            parsed.spawned = spawns_of(response)?;
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests;
