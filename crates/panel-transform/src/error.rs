//! Error taxonomy for panel operations.
//!
//! Structural problems (absent columns, duplicate keys, non-numeric values)
//! abort the operation. Data-quality conditions are not errors; see
//! [`panel_model::report`].

use polars::prelude::PolarsError;
use thiserror::Error;

use panel_model::ModelError;

#[derive(Debug, Error)]
pub enum PanelError {
    /// A referenced column does not exist.
    #[error("column `{column}` not found")]
    Schema { column: String },

    /// One or more required columns are absent; lists all of them.
    #[error("missing columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    /// Several source rows share one (unit, period) key.
    #[error("duplicate key ({unit}, {period}): {count} source rows")]
    DuplicateKey {
        unit: String,
        period: String,
        count: usize,
    },

    #[error("column `{column}` row {row}: `{value}` is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column `{column}` has {actual} values, dataset has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The requested table does not exist in the external source.
    #[error("source not found: {source_name}")]
    SourceNotFound { source_name: String },

    /// The external source holds the table but could not produce it.
    #[error("failed to read {source_name}: {message}")]
    Read {
        source_name: String,
        message: String,
    },

    /// The external sink rejected the dataset.
    #[error("failed to write {target}: {message}")]
    Write { target: String, message: String },

    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),
}

impl PanelError {
    pub fn schema(column: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for errors raised by the external I/O collaborators.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::Read { .. } | Self::Write { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;
