//! Blocking wait for query completion.

use std::time::Duration;

use crate::QueryEngine;
use crate::error::WaitError;
use crate::types::{QueryHandle, QueryState};

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between status checks.
    pub poll_interval: Duration,
    /// Maximum number of status checks (at least one is always made).
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl WaitPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts,
        }
    }
}

/// Polls `handle` until the engine reports success.
///
/// # Errors
///
/// - `WaitError::Failed` / `WaitError::Cancelled` on a non-success terminal state
/// - `WaitError::Exhausted` when the poll budget runs out
/// - `WaitError::Status` when a status check itself fails
pub async fn wait_for_success<E>(
    engine: &E,
    handle: &QueryHandle,
    policy: &WaitPolicy,
) -> Result<(), WaitError>
where
    E: QueryEngine + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let state = engine
            .status(handle)
            .await
            .map_err(|source| WaitError::Status {
                handle: handle.clone(),
                source,
            })?;

        match state {
            QueryState::Succeeded => {
                tracing::debug!(query = %handle, attempt, "query succeeded");
                return Ok(());
            }
            QueryState::Failed { reason } => {
                return Err(WaitError::Failed {
                    handle: handle.clone(),
                    reason: reason.unwrap_or_else(|| "no reason reported".to_string()),
                });
            }
            QueryState::Cancelled { reason } => {
                return Err(WaitError::Cancelled {
                    handle: handle.clone(),
                    reason: reason.unwrap_or_else(|| "no reason reported".to_string()),
                });
            }
            QueryState::Queued | QueryState::Running => {
                tracing::trace!(query = %handle, attempt, "query not finished");
                if attempt < max_attempts {
                    tokio::time::sleep(policy.poll_interval).await;
                }
            }
        }
    }

    Err(WaitError::Exhausted {
        handle: handle.clone(),
        attempts: max_attempts,
    })
}
