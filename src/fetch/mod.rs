//! Fetch function seam
//!
//! The scheduler never performs I/O itself; it hands each batch to a
//! caller-supplied [`Fetcher`]. Callers either provide one monolithic
//! fetcher, or register one handler per entity type in a
//! [`HandlerRegistry`] (the default dispatch mode).

use crate::error::{Error, Result};
use crate::paging::PagingState;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Performs one fetch for a batch of paging states.
///
/// `params` is the caller-chosen context threaded to every fetch; the core
/// never inspects it. Any `Err` becomes a batch-wide failure: the error is
/// attached to every state in the batch and each is emitted terminally.
#[async_trait]
pub trait Fetcher<P, R, T, C>: Send + Sync {
    /// Fetch one page (or one batched request) for the given states
    async fn fetch(&self, params: &P, batch: &[PagingState<T, C>]) -> Result<R>;
}

type FetchClosure<P, R, T, C> =
    Box<dyn Fn(&P, &[PagingState<T, C>]) -> BoxFuture<'static, Result<R>> + Send + Sync>;

/// Adapter turning a closure into a [`Fetcher`].
///
/// The closure receives the params and batch by reference and must return
/// an owned future, so it clones whatever the request needs (an HTTP
/// client, a URL) before going async:
///
/// ```rust,ignore
/// use futures::FutureExt;
///
/// let fetcher = FetchFn::new(|client: &Client, batch| {
///     let request = client.get(url_for(&batch[0]));
///     async move { request.send().await.map_err(Error::other) }.boxed()
/// });
/// ```
pub struct FetchFn<P, R, T, C> {
    f: FetchClosure<P, R, T, C>,
}

impl<P, R, T, C> FetchFn<P, R, T, C> {
    /// Wrap a closure as a fetcher
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P, &[PagingState<T, C>]) -> BoxFuture<'static, Result<R>> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl<P, R, T, C> Fetcher<P, R, T, C> for FetchFn<P, R, T, C>
where
    P: Send + Sync,
    R: Send,
    T: Send + Sync,
    C: Send + Sync,
{
    async fn fetch(&self, params: &P, batch: &[PagingState<T, C>]) -> Result<R> {
        (self.f)(params, batch).await
    }
}

/// Per-entity-type fetch dispatch.
///
/// The default fetch mode: a registry mapping entity type to handler.
/// Dispatch looks at the batch's first member; with the default batch key
/// all members of a batch share an entity type. A batch whose entity type
/// has no registered handler fails with [`Error::UnknownEntityType`],
/// surfaced exactly like any other fetch failure.
pub struct HandlerRegistry<P, R, T, C> {
    handlers: HashMap<String, Arc<dyn Fetcher<P, R, T, C>>>,
}

impl<P, R, T, C> HandlerRegistry<P, R, T, C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an entity type, replacing any previous one
    pub fn register(
        &mut self,
        entity_type: impl Into<String>,
        handler: impl Fetcher<P, R, T, C> + 'static,
    ) {
        self.handlers.insert(entity_type.into(), Arc::new(handler));
    }

    /// Check whether a handler is registered for an entity type
    pub fn contains(&self, entity_type: &str) -> bool {
        self.handlers.contains_key(entity_type)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<P, R, T, C> Default for HandlerRegistry<P, R, T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R, T, C> Clone for HandlerRegistry<P, R, T, C> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

#[async_trait]
impl<P, R, T, C> Fetcher<P, R, T, C> for HandlerRegistry<P, R, T, C>
where
    P: Send + Sync,
    R: Send,
    T: Send + Sync,
    C: Send + Sync,
{
    async fn fetch(&self, params: &P, batch: &[PagingState<T, C>]) -> Result<R> {
        let entity_type = batch
            .first()
            .map(PagingState::entity_type)
            .ok_or_else(|| Error::fetch("empty batch dispatched"))?;
        let handler = self
            .handlers
            .get(entity_type)
            .ok_or_else(|| Error::unknown_entity_type(entity_type))?;
        handler.fetch(params, batch).await
    }
}
