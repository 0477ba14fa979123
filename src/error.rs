//! Error types for pageflow
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! The error type is `Clone` on purpose: a single failed fetch attaches the
//! same error to every paging state in the batch, and the collecting
//! front-ends re-surface a stored error by value.

use thiserror::Error;

/// The main error type for pageflow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ============================================================================
    // Fetch Errors
    // ============================================================================
    /// The fetch function failed for a batch
    #[error("fetch failed: {message}")]
    Fetch {
        /// What went wrong, as reported by the fetch function
        message: String,
    },

    /// Default dispatch found no handler for a batch's entity type
    #[error("no fetch handler registered for entity type '{entity_type}'")]
    UnknownEntityType {
        /// The entity type that had no handler
        entity_type: String,
    },

    // ============================================================================
    // Parse Errors
    // ============================================================================
    /// The result parser failed on a response
    #[error("failed to parse fetch response: {message}")]
    Parse {
        /// What went wrong during extraction
        message: String,
    },

    /// A single-state parser was handed a batch with more (or fewer) than
    /// one member
    #[error("single-state parser received a batch of {actual} states")]
    InvalidBatchSize {
        /// The offending batch size
        actual: usize,
    },

    // ============================================================================
    // Scheduler Errors
    // ============================================================================
    /// The scheduler could not make progress
    #[error("scheduler error: {message}")]
    Scheduler {
        /// What went wrong
        message: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    /// Any other error, carried as its message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create an unknown entity type error
    pub fn unknown_entity_type(entity_type: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            entity_type: entity_type.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid batch size error
    pub fn invalid_batch_size(actual: usize) -> Self {
        Self::InvalidBatchSize { actual }
    }

    /// Create a scheduler error
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::Scheduler {
            message: message.into(),
        }
    }

    /// Create a generic error from any displayable value
    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other(message.to_string())
    }

    /// Check if this error came from the fetch side (as opposed to parsing)
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::UnknownEntityType { .. })
    }

    /// Check if this error came from the parse side
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::InvalidBatchSize { .. })
    }
}

/// Result type alias for pageflow
pub type Result<T> = std::result::Result<T, Error>;
