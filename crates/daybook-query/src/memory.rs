//! In-memory query engine for testing.
//!
//! Returns a fixed [`ResultSet`] for every query and walks a scripted sequence
//! of states on status checks.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: SQL is recorded, never executed
//! - **One script for all queries**: status checks consume a single shared script

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::QueryEngine;
use crate::error::{Error, Result};
use crate::types::{QueryHandle, QuerySpec, QueryState, ResultSet};

#[derive(Debug)]
struct EngineState {
    results: ResultSet,
    script: VecDeque<QueryState>,
    final_state: QueryState,
    handles: HashSet<QueryHandle>,
    submitted: Vec<QuerySpec>,
    status_calls: usize,
    submit_error: Option<String>,
    fetch_error: Option<String>,
}

/// Scripted in-memory query engine.
///
/// ## Example
///
/// ```rust
/// use daybook_query::{InMemoryQueryEngine, QueryState, ResultRow, ResultSet};
///
/// let results = ResultSet::with_header(
///     ResultRow::from_values(&["report_date", "total_events", "unique_event_types"]),
///     vec![ResultRow::from_values(&["2024-03-01", "1532", "12"])],
/// );
/// let engine = InMemoryQueryEngine::new(results)
///     .with_status_script(vec![QueryState::Running, QueryState::Succeeded]);
/// ```
#[derive(Debug)]
pub struct InMemoryQueryEngine {
    state: Mutex<EngineState>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Service(daybook_core::Error::Internal {
        message: "query engine lock poisoned".to_string(),
    })
}

fn injected(message: &str) -> Error {
    Error::Service(daybook_core::Error::Api {
        service: "memory",
        status: 500,
        code: "InjectedFailure".to_string(),
        message: message.to_string(),
    })
}

impl InMemoryQueryEngine {
    /// Creates an engine whose queries succeed on the first status check.
    #[must_use]
    pub fn new(results: ResultSet) -> Self {
        Self {
            state: Mutex::new(EngineState {
                results,
                script: VecDeque::new(),
                final_state: QueryState::Succeeded,
                handles: HashSet::new(),
                submitted: Vec::new(),
                status_calls: 0,
                submit_error: None,
                fetch_error: None,
            }),
        }
    }

    /// Creates an engine whose queries stay `Running` forever.
    #[must_use]
    pub fn never_finishes() -> Self {
        let engine = Self::new(ResultSet::default());
        engine.set(|s| s.final_state = QueryState::Running);
        engine
    }

    /// States returned by successive status checks; the last one repeats.
    #[must_use]
    pub fn with_status_script(self, script: Vec<QueryState>) -> Self {
        self.set(|s| {
            if let Some(last) = script.last() {
                s.final_state = last.clone();
            }
            s.script = script.into();
        });
        self
    }

    /// Makes every submission fail with `message`.
    #[must_use]
    pub fn with_submit_error(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.set(|s| s.submit_error = Some(message));
        self
    }

    /// Makes every result fetch fail with `message`.
    #[must_use]
    pub fn with_fetch_error(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.set(|s| s.fetch_error = Some(message));
        self
    }

    /// Replaces the results returned for subsequent fetches.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_results(&self, results: ResultSet) -> Result<()> {
        self.state.lock().map_err(poison_err)?.results = results;
        Ok(())
    }

    /// Queries submitted so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn submitted(&self) -> Result<Vec<QuerySpec>> {
        Ok(self.state.lock().map_err(poison_err)?.submitted.clone())
    }

    /// Number of status checks made so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn status_calls(&self) -> Result<usize> {
        Ok(self.state.lock().map_err(poison_err)?.status_calls)
    }

    fn set(&self, f: impl FnOnce(&mut EngineState)) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

#[async_trait]
impl QueryEngine for InMemoryQueryEngine {
    async fn submit(&self, spec: &QuerySpec) -> Result<QueryHandle> {
        let mut state = self.state.lock().map_err(poison_err)?;
        if let Some(message) = &state.submit_error {
            return Err(injected(message));
        }

        state.submitted.push(spec.clone());
        let handle = QueryHandle::new(format!("memory-query-{}", state.submitted.len()));
        state.handles.insert(handle.clone());
        drop(state);
        Ok(handle)
    }

    async fn status(&self, handle: &QueryHandle) -> Result<QueryState> {
        let mut state = self.state.lock().map_err(poison_err)?;
        if !state.handles.contains(handle) {
            return Err(Error::QueryNotFound(handle.clone()));
        }

        state.status_calls += 1;
        let next = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.final_state.clone());
        drop(state);
        Ok(next)
    }

    async fn fetch_results(&self, handle: &QueryHandle) -> Result<ResultSet> {
        let state = self.state.lock().map_err(poison_err)?;
        if !state.handles.contains(handle) {
            return Err(Error::QueryNotFound(handle.clone()));
        }
        if let Some(message) = &state.fetch_error {
            return Err(injected(message));
        }
        Ok(state.results.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
