//! Errors reported through query results and engine construction.

use std::sync::Arc;

use skyquery_core::{Domain, StoreError};
use thiserror::Error;

/// Terminal failure of a single query.
///
/// Every holder of a [`QueryResult`](crate::QueryResult) observes the same
/// value, so the error is cheap to clone and shares store errors by `Arc`.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// No store is configured for the domain, or it failed to open.
    #[error("{domain} data is unavailable")]
    Unavailable {
        /// Domain whose store is missing.
        domain: Domain,
    },
    /// The backing store reported a failure.
    #[error(transparent)]
    Store(Arc<StoreError>),
    /// The query was cancelled before it produced a value.
    #[error("query was cancelled")]
    Cancelled,
    /// The engine shut down before the query ran.
    #[error("query engine has shut down")]
    Shutdown,
    /// The query's action panicked.
    #[error("query panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
    /// The requested area holds no data at all.
    #[error("no data available for the requested area")]
    NoData,
    /// The request parameters exceed what the engine accepts.
    #[error("request out of range: {reason}")]
    OutOfRange {
        /// Which limit was exceeded.
        reason: String,
    },
}

impl QueryError {
    /// Build an [`QueryError::OutOfRange`] from any displayable reason.
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }

    /// Return `true` for [`QueryError::Cancelled`].
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<StoreError> for QueryError {
    fn from(error: StoreError) -> Self {
        Self::Store(Arc::new(error))
    }
}

/// Errors raised while constructing an [`Engine`](crate::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The worker thread could not be started.
    #[error("failed to spawn query worker: {source}")]
    Spawn {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
