//! # daybook-query
//!
//! Contract for asynchronous SQL-over-object-store query engines.
//!
//! A query is submitted, polled until it reaches a terminal state, and its
//! tabular results are fetched:
//!
//! ```rust,ignore
//! use daybook_query::{QueryEngine, WaitPolicy, wait_for_success};
//!
//! let handle = engine.submit(&spec).await?;
//! wait_for_success(&engine, &handle, &WaitPolicy::default()).await?;
//! let results = engine.fetch_results(&handle).await?;
//! ```
//!
//! ## Implementations
//!
//! - [`athena::AthenaQueryEngine`]: Athena JSON protocol over signed HTTP
//! - [`memory::InMemoryQueryEngine`]: scripted engine for tests and local runs

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod athena;
pub mod error;
pub mod memory;
pub mod types;
pub mod waiter;

use async_trait::async_trait;

pub use athena::AthenaQueryEngine;
pub use error::{Error, Result, WaitError};
pub use memory::InMemoryQueryEngine;
pub use types::{QueryHandle, QuerySpec, QueryState, ResultRow, ResultSet};
pub use waiter::{WaitPolicy, wait_for_success};

/// An asynchronous query engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Submits a query and returns its handle without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the query or cannot be reached.
    async fn submit(&self, spec: &QuerySpec) -> Result<QueryHandle>;

    /// Reads the current execution state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    async fn status(&self, handle: &QueryHandle) -> Result<QueryState>;

    /// Fetches the results of a succeeded query (header row first).
    ///
    /// # Errors
    ///
    /// Returns an error if results cannot be read.
    async fn fetch_results(&self, handle: &QueryHandle) -> Result<ResultSet>;

    /// Engine name for logs.
    fn name(&self) -> &'static str;
}
