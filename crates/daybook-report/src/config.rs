//! Job configuration from environment variables.

use std::time::Duration;

use daybook_core::aws::region_from_lookup;
use daybook_core::{BucketLocation, Error, Result};
use daybook_query::WaitPolicy;
use daybook_query::waiter::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};

use crate::report::QueryTarget;

/// Database used when `ATHENA_DB` is unset.
pub const DEFAULT_DATABASE: &str = "events_db";

/// Table used when `ATHENA_TABLE` is unset.
pub const DEFAULT_TABLE: &str = "events_raw";

/// Prefix under the output bucket where the engine writes query results.
pub const QUERY_RESULTS_PREFIX: &str = "athena-results/";

/// Sender and recipient for the report email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRoute {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
}

/// Everything a report run needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    /// Database holding the event table.
    pub database: String,
    /// Event table.
    pub table: String,
    /// Bucket receiving query scratch output.
    pub output_bucket: String,
    /// Bucket receiving reports (`s3://` name or `memory://`).
    pub report_bucket: String,
    /// Query workgroup, engine default when unset.
    pub workgroup: Option<String>,
    /// Email route; notification is skipped when unset.
    pub email: Option<EmailRoute>,
    /// Completion wait settings.
    pub wait_policy: WaitPolicy,
    /// Service region.
    pub region: String,
    /// Query engine endpoint override.
    pub athena_endpoint: Option<String>,
    /// Email service endpoint override.
    pub ses_endpoint: Option<String>,
}

impl ReportConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| non_empty(lookup(name));

        let database = get("ATHENA_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        validate_identifier("ATHENA_DB", &database)?;
        let table = get("ATHENA_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        validate_identifier("ATHENA_TABLE", &table)?;

        let output_bucket = match BucketLocation::parse(&required(&get, "OUTPUT_BUCKET")?)? {
            BucketLocation::S3(name) => name,
            BucketLocation::Memory => {
                return Err(Error::InvalidInput(
                    "OUTPUT_BUCKET must name an S3 bucket".to_string(),
                ));
            }
        };
        let report_bucket = required(&get, "REPORT_BUCKET")?;
        BucketLocation::parse(&report_bucket)?;

        let email = match (get("SES_FROM"), get("SES_TO")) {
            (Some(from), Some(to)) => Some(EmailRoute { from, to }),
            _ => None,
        };

        let poll_interval = parse_u64("QUERY_POLL_INTERVAL_SECS", get("QUERY_POLL_INTERVAL_SECS"))?
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs);
        let max_attempts = match parse_u64("QUERY_MAX_POLLS", get("QUERY_MAX_POLLS"))? {
            None => DEFAULT_MAX_ATTEMPTS,
            Some(0) => {
                return Err(Error::InvalidInput(
                    "QUERY_MAX_POLLS must be at least 1".to_string(),
                ));
            }
            Some(n) => u32::try_from(n).map_err(|_| {
                Error::InvalidInput(format!("QUERY_MAX_POLLS is too large: {n}"))
            })?,
        };

        Ok(Self {
            database,
            table,
            output_bucket,
            report_bucket,
            workgroup: get("ATHENA_WORKGROUP"),
            email,
            wait_policy: WaitPolicy::new(poll_interval, max_attempts),
            region: region_from_lookup(&lookup),
            athena_endpoint: get("DAYBOOK_ATHENA_ENDPOINT"),
            ses_endpoint: get("DAYBOOK_SES_ENDPOINT"),
        })
    }

    /// Scratch URI handed to the query engine.
    #[must_use]
    pub fn output_location(&self) -> String {
        format!("s3://{}/{QUERY_RESULTS_PREFIX}", self.output_bucket)
    }

    /// Query target derived from this configuration.
    #[must_use]
    pub fn query_target(&self) -> QueryTarget {
        QueryTarget {
            database: self.database.clone(),
            table: self.table.clone(),
            output_location: self.output_location(),
            workgroup: self.workgroup.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn required(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    get(name).ok_or_else(|| Error::configuration(format!("{name} must be set")))
}

fn parse_u64(name: &str, value: Option<String>) -> Result<Option<u64>> {
    let Some(v) = value else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

/// Accepts `[A-Za-z0-9_]+` not starting with a digit.
fn validate_identifier(name: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{name} must be a plain identifier (got {value:?})"
        )))
    }
}
