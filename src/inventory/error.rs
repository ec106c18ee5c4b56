//! Inventory error types.

use thiserror::Error;

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// No inventory row with this table ID.
    #[error("table not found in inventory: {0}")]
    NotFound(String),

    /// A search filter names a field the inventory does not have.
    #[error("unknown inventory field: {0}")]
    UnknownField(String),

    /// A search pattern did not compile.
    #[error("invalid pattern {pattern:?}: {error}")]
    InvalidPattern {
        pattern: String,
        #[source]
        error: regex::Error,
    },

    /// A filter given as text is not of the form `field=value`.
    #[error("invalid filter {0:?}: expected field=value")]
    InvalidFilter(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound(_))
    }

    /// Check if this error was caused by a malformed query.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            InventoryError::UnknownField(_)
                | InventoryError::InvalidPattern { .. }
                | InventoryError::InvalidFilter(_)
        )
    }
}
