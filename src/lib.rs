//! # pageflow
//!
//! A concurrent pagination scheduler. Many HTTP APIs expose large
//! collections through page-cursor protocols (continuation tokens, offsets,
//! "next" links); pageflow fully enumerates many such collections, possibly
//! of different entity kinds, in parallel under a global concurrency
//! budget, batching compatible requests into single calls, and optionally
//! using page results to spawn further pagination work (list accounts, then
//! for each account list repositories).
//!
//! ## Features
//!
//! - **Streaming core**: feed paging states in, read terminal states out
//! - **Bounded concurrency**: at most `max_concurrency` fetches in flight
//! - **Batching**: group compatible states per fetch call, sorted or not
//! - **Spawning**: parsers can inject new paging states mid-run
//! - **Per-state errors**: a failed fetch fails its batch, never the run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pageflow::{Engine, EntityKey, SingleStateParser};
//!
//! #[tokio::main]
//! async fn main() -> pageflow::Result<()> {
//!     let parser = SingleStateParser::new(
//!         |resp: &ApiPage| Ok(resp.items.clone()),
//!         |resp: &ApiPage| Ok(resp.next_cursor.clone()),
//!     );
//!
//!     let engine = Engine::new(parser)
//!         .with_fetcher(my_fetcher)
//!         .with_concurrency(8);
//!
//!     let items = engine.paginate_one(client, "accounts", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! input stream ──▶ Scheduler ──▶ Batcher ──▶ FetchExecutor ──▶ fetch_fn
//!                     ▲                                           │
//!                     │            ResultParser ◀── response ─────┘
//!                     │                 │
//!                     └── next page ────┤
//!                         spawns ───────┤
//!                                       ▼
//!                                 output stream
//! ```
//!
//! One coordinator task owns all mutable scheduler state; fetches run as
//! independent tasks on the configured spawner. The coordinator reacts to
//! input states, batch completions and a 100 ms idle timer that flushes
//! partial batches.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Paging state and cursor tracking
pub mod paging;

/// Result parsing contract and convenience parsers
pub mod parser;

/// Batching of paging states
pub mod batch;

/// Fetch function seam and per-entity-type dispatch
pub mod fetch;

/// Bounded-parallelism fetch execution
pub mod executor;

/// The scheduler coordinator loop
pub mod scheduler;

/// Engine configuration and entry points
pub mod engine;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};

pub use batch::{Batch, BatchKeyFn, BatchStatus, Batcher};
pub use engine::Engine;
pub use executor::{Completion, FetchExecutor, TaskSpawner, TokioSpawner};
pub use fetch::{FetchFn, Fetcher, HandlerRegistry};
pub use paging::{EntityKey, PageCursor, PagingState};
pub use parser::{
    MultiStateParser, PageUpdate, ParsedBatch, ResultParser, SingleStateParser, StateUpdate,
};
pub use scheduler::PageStream;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
