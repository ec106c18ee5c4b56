//! Store-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::inventory::InventoryError;
use crate::storage::StorageError;
use crate::table::{InvalidReason, TableError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Everything a [`Store`](crate::db::Store) operation can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table failed the consistency check; nothing was written.
    #[error("invalid table {id}: {reason}")]
    InvalidTable { id: String, reason: InvalidReason },

    /// The table is not in the inventory.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The source is not registered and no metadata was given to create it.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Source metadata was given for a different source than the table's.
    #[error("source metadata is for {meta}, but the table belongs to {table}")]
    SourceMismatch { table: String, meta: String },

    /// `update_tables` got a different number of old IDs and tables.
    #[error("{ids} table IDs given for {tables} tables")]
    LengthMismatch { ids: usize, tables: usize },

    /// A mutating operation was attempted on a read-only store.
    #[error("store at {0} is read-only")]
    ReadOnly(PathBuf),

    /// The path holds no store.
    #[error("no datashelf store at {0}")]
    NotInitialized(PathBuf),

    /// `init` without `force` on an existing store.
    #[error("a datashelf store already exists at {0}")]
    AlreadyExists(PathBuf),

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Table(TableError),

    #[error(transparent)]
    Catalog(CatalogError),

    #[error(transparent)]
    Inventory(InventoryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TableError> for StoreError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Invalid { id, reason } => StoreError::InvalidTable { id, reason },
            other => StoreError::Table(other),
        }
    }
}

impl From<CatalogError> for StoreError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::UnknownSource(id) => StoreError::UnknownSource(id),
            other => StoreError::Catalog(other),
        }
    }
}

impl From<InventoryError> for StoreError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::NotFound(id) => StoreError::TableNotFound(id),
            other => StoreError::Inventory(other),
        }
    }
}

impl StoreError {
    /// Rejected input; no state was changed.
    pub fn is_validation(&self) -> bool {
        match self {
            StoreError::InvalidTable { .. }
            | StoreError::SourceMismatch { .. }
            | StoreError::LengthMismatch { .. }
            | StoreError::ReadOnly(_)
            | StoreError::AlreadyExists(_)
            | StoreError::Config(_) => true,
            StoreError::Table(e) => e.is_invalid(),
            StoreError::Catalog(e) => e.is_usage_error(),
            StoreError::Inventory(e) => e.is_usage_error(),
            StoreError::Storage(e) => e.is_usage_error(),
            _ => false,
        }
    }

    /// The store on disk disagrees with itself and needs manual repair.
    pub fn is_consistency(&self) -> bool {
        matches!(self, StoreError::Catalog(e) if e.is_consistency())
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::TableNotFound(_)
            | StoreError::UnknownSource(_)
            | StoreError::NotInitialized(_) => true,
            StoreError::Catalog(e) => e.is_not_found(),
            StoreError::Inventory(e) => e.is_not_found(),
            StoreError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Process exit code: 1 validation (and any other failure),
    /// 2 consistency, 3 not found.
    pub fn exit_code(&self) -> u8 {
        if self.is_consistency() {
            2
        } else if self.is_not_found() {
            3
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let e: StoreError = TableError::Invalid {
            id: "X__Y__Z".into(),
            reason: InvalidReason::DuplicateRows(vec!["ZAF".into()]),
        }
        .into();
        assert!(matches!(e, StoreError::InvalidTable { .. }));
        assert_eq!(e.exit_code(), 1);

        let e: StoreError = CatalogError::UnknownSource("SRC".into()).into();
        assert!(matches!(e, StoreError::UnknownSource(_)));
        assert_eq!(e.exit_code(), 3);

        let e: StoreError = InventoryError::NotFound("A__B__C".into()).into();
        assert!(matches!(e, StoreError::TableNotFound(_)));
        assert_eq!(e.exit_code(), 3);
    }

    #[test]
    fn test_exit_codes() {
        let mismatch = StoreError::from(CatalogError::HashMismatch {
            source_id: "SRC".into(),
            recorded: None,
            actual: Some("abc".into()),
        });
        assert_eq!(mismatch.exit_code(), 2);

        let dirty = StoreError::from(CatalogError::InconsistentRepository {
            repo: "SRC".into(),
            path: PathBuf::from("database/SRC"),
        });
        assert_eq!(dirty.exit_code(), 2);

        assert!(StoreError::ReadOnly(PathBuf::from("x")).is_validation());
        assert_eq!(StoreError::Inventory(InventoryError::UnknownField("x".into())).exit_code(), 1);
    }
}
