//! Query request, handle, state and result types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A query ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// SQL text.
    pub sql_text: String,
    /// Database (catalog schema) the query runs in.
    pub database_name: String,
    /// Object-store URI where the engine writes result files.
    pub output_location: String,
    /// Workgroup to run in; the engine default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
}

/// Opaque identifier of a submitted query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHandle(String);

impl QueryHandle {
    /// Wraps an engine-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    /// Accepted, not started.
    Queued,
    /// Executing.
    Running,
    /// Finished successfully; results can be fetched.
    Succeeded,
    /// Finished with an error.
    Failed {
        /// Reason reported by the engine, if any.
        reason: Option<String>,
    },
    /// Cancelled before completion.
    Cancelled {
        /// Reason reported by the engine, if any.
        reason: Option<String>,
    },
}

impl QueryState {
    /// Parses the engine's wire state name (`QUEUED`, `RUNNING`, `SUCCEEDED`, `FAILED`, `CANCELLED`).
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownState` for any other value.
    pub fn from_wire(state: &str, reason: Option<String>) -> Result<Self> {
        match state {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed { reason }),
            "CANCELLED" => Ok(Self::Cancelled { reason }),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }

    /// Whether no further progress will happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// One result row: positional, nullable string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow(Vec<Option<String>>);

impl ResultRow {
    /// Creates a row from cells.
    #[must_use]
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self(cells)
    }

    /// Creates a row where every cell is present.
    #[must_use]
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        Self(values.iter().map(|v| Some(v.as_ref().to_string())).collect())
    }

    /// Returns the cell at `index` if the column exists and holds a value.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(Option::as_deref)
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tabular result of a query.
///
/// Row 0 is the column header row; data rows follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Creates a result set from raw rows (header first).
    #[must_use]
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    /// Creates a result set from a header and data rows.
    #[must_use]
    pub fn with_header(header: ResultRow, data: Vec<ResultRow>) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header);
        rows.extend(data);
        Self { rows }
    }

    /// The header row, if any.
    #[must_use]
    pub fn header(&self) -> Option<&ResultRow> {
        self.rows.first()
    }

    /// The first data row; `None` when the result only has a header (or nothing).
    #[must_use]
    pub fn first_data_row(&self) -> Option<&ResultRow> {
        self.rows.get(1)
    }

    /// Data rows, header excluded.
    #[must_use]
    pub fn data_rows(&self) -> &[ResultRow] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Total rows including the header.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
