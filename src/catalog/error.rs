//! Catalog error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by the source catalog and the repository manager.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A repository has uncommitted or untracked changes.
    #[error("repository {repo} is inconsistent: uncommitted changes in {path}")]
    InconsistentRepository { repo: String, path: PathBuf },

    /// The hash recorded in `sources.csv` disagrees with the repository head.
    #[error(
        "hash mismatch for source {source_id}: catalog has {}, repository has {}",
        .recorded.as_deref().unwrap_or("<none>"),
        .actual.as_deref().unwrap_or("<none>")
    )]
    HashMismatch {
        source_id: String,
        recorded: Option<String>,
        actual: Option<String>,
    },

    /// The source is not registered in the catalog.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// A source with this ID is already registered.
    #[error("source already exists: {0}")]
    SourceExists(String),

    /// The source ID cannot be used as a repository name.
    #[error("invalid source id {id:?}: {reason}")]
    InvalidSourceId { id: String, reason: String },

    /// `sources.csv` or `meta.csv` could not be parsed.
    #[error("malformed catalog file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CatalogError {
    /// Check if this error means the on-disk state must be repaired by hand.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            CatalogError::InconsistentRepository { .. } | CatalogError::HashMismatch { .. }
        )
    }

    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            CatalogError::UnknownSource(_) => true,
            CatalogError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was caused by bad input.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            CatalogError::SourceExists(_) | CatalogError::InvalidSourceId { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_mismatch_message() {
        let err = CatalogError::HashMismatch {
            source_id: "SRC_2020".into(),
            recorded: Some("abc".into()),
            actual: None,
        };
        assert_eq!(
            err.to_string(),
            "hash mismatch for source SRC_2020: catalog has abc, repository has <none>"
        );
        assert!(err.is_consistency());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_classification() {
        assert!(CatalogError::UnknownSource("X".into()).is_not_found());
        assert!(CatalogError::SourceExists("X".into()).is_usage_error());
        let storage = CatalogError::from(StorageError::RemoteNotFound("origin".into()));
        assert!(storage.is_not_found());
    }
}
