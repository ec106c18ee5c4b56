//! Table error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Why a table was rejected by the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    /// A cell holds something that is not a number.
    #[error("non-numeric value {value:?} at region {region}, column {column}")]
    NonNumeric {
        region: String,
        column: String,
        value: String,
    },

    /// Row labels outside of the known countries and regions.
    #[error("unknown spatial identifiers: {}", .0.join(", "))]
    UnknownSpatialIds(Vec<String>),

    /// Column labels that are not integer years.
    #[error("non-integer year columns: {}", .0.join(", "))]
    NonIntegerColumns(Vec<String>),

    /// Row labels that appear more than once.
    #[error("duplicated region labels: {}", .0.join(", "))]
    DuplicateRows(Vec<String>),
}

/// Errors that can occur while building, checking or (de)serializing tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// The table failed the consistency check.
    #[error("invalid table {id}: {reason}")]
    Invalid { id: String, reason: InvalidReason },

    /// Metadata needed to derive the table ID is missing.
    #[error("missing required meta field: {0}")]
    MissingMeta(&'static str),

    /// Values do not match the declared rows and columns.
    #[error("shape mismatch: {rows} regions x {columns} columns, got {found}")]
    Shape {
        rows: usize,
        columns: usize,
        found: String,
    },

    /// The table file does not follow the annotated CSV layout.
    #[error("malformed table file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// CSV reader/writer failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableError {
    /// Check if this error is a rejected (but otherwise well-formed) table.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            TableError::Invalid { .. } | TableError::MissingMeta(_) | TableError::Shape { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_messages() {
        let reason = InvalidReason::UnknownSpatialIds(vec!["XXX".into(), "YYY".into()]);
        assert_eq!(reason.to_string(), "unknown spatial identifiers: XXX, YYY");

        let err = TableError::Invalid {
            id: "A__B__C".into(),
            reason: InvalidReason::NonIntegerColumns(vec!["2020a".into()]),
        };
        assert!(err.is_invalid());
        assert!(err.to_string().contains("2020a"));
    }
}
