//! Shared test utilities for daybook tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording
//! - [`ReportHarness`]: In-memory engine, storage and notifier wired together
//! - Result set builders shaped like the daily summary query
//!
//! # Example
//!
//! ```rust,ignore
//! use daybook_test_utils::{ReportHarness, summary_results};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = ReportHarness::new(summary_results("2024-03-01", "1532", "12"));
//!     // ... build a job from harness.storage / harness.engine ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("daybook=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
