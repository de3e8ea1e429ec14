//! # daybook-report
//!
//! Daily event summary report job.
//!
//! One run builds a date-scoped summary query, waits for the query engine,
//! renders the first result row into a fixed plain-text report, writes it to
//! `reports/daily_report_{date}.txt` and emails it when an email route is
//! configured.
//!
//! ## Modules
//!
//! - [`report`]: request, query text and report rendering
//! - [`job`]: [`ReportJob`] orchestration and [`JobOutcome`]
//! - [`handler`]: `{statusCode, body}` invocation contract
//! - [`config`]: environment configuration
//! - [`server`]: HTTP trigger surface
//! - [`metrics`]: Prometheus metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use daybook_report::{ReportConfig, ReportJob};
//!
//! let config = ReportConfig::from_env()?;
//! let job = ReportJob::new(storage, engine, config.query_target())
//!     .with_wait_policy(config.wait_policy);
//! let outcome = job.run(chrono::Local::now().fixed_offset()).await;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod handler;
pub mod job;
pub mod metrics;
pub mod report;
pub mod server;

pub use config::{EmailRoute, ReportConfig};
pub use handler::{InvocationResponse, handle};
pub use job::{GeneratedReport, JobError, JobOutcome, ReportJob};
pub use report::{QueryTarget, ReportDocument, ReportRequest};
