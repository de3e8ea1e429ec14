//! Error types for query submission, status checks and result fetches.

use crate::types::QueryHandle;

/// The result type used throughout daybook-query.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`QueryEngine`](crate::QueryEngine) implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service call failed (transport, service error, encoding).
    #[error(transparent)]
    Service(#[from] daybook_core::Error),

    /// The engine reported a state this crate does not know.
    #[error("unknown query state: {0}")]
    UnknownState(String),

    /// The engine does not know the handle.
    #[error("query not found: {0}")]
    QueryNotFound(QueryHandle),
}

/// Why waiting for a query to succeed ended without success.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The query reached the failed terminal state.
    #[error("query {handle} failed: {reason}")]
    Failed {
        /// Query handle.
        handle: QueryHandle,
        /// Reason reported by the engine.
        reason: String,
    },

    /// The query was cancelled.
    #[error("query {handle} was cancelled: {reason}")]
    Cancelled {
        /// Query handle.
        handle: QueryHandle,
        /// Reason reported by the engine.
        reason: String,
    },

    /// The poll budget ran out before a terminal state was seen.
    #[error("query {handle} did not reach a terminal state after {attempts} status checks")]
    Exhausted {
        /// Query handle.
        handle: QueryHandle,
        /// Number of status checks made.
        attempts: u32,
    },

    /// Reading the query status failed.
    #[error("status check for query {handle} failed: {source}")]
    Status {
        /// Query handle.
        handle: QueryHandle,
        /// Underlying error.
        #[source]
        source: Error,
    },
}
