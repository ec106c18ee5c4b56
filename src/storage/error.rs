//! Storage layer error types
//!
//! All errors that can occur while driving a version-control working tree are
//! defined here. We use `thiserror` for ergonomic error definition and better
//! error messages

use std::path::PathBuf;

use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// a removal was staged for a path that was never committed
    #[error("file not tracked in {repo}: {path}")]
    FileNotTracked { repo: PathBuf, path: PathBuf },

    /// commit was requested with an empty staging set
    #[error("nothing to commit in {0}")]
    NothingToCommit(PathBuf),

    /// path lies outside of the repository working tree
    #[error("path {path} is outside of repository {repo}")]
    OutsideWorkdir { repo: PathBuf, path: PathBuf },

    /// repo is not initialized
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// no remote with that name is configured
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// pull would require a merge
    #[error("cannot fast-forward {branch}: local and remote history diverged")]
    NonFastForward { branch: String },

    /// repository is bare or otherwise has no working tree
    #[error("repository has no working directory: {0}")]
    NoWorkdir(PathBuf),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::FileNotTracked { .. }
                | StorageError::CommitNotFound(_)
                | StorageError::RemoteNotFound(_)
                | StorageError::NotInitialized(_)
        )
    }

    /// check if this error is caused by the caller and leaves no trace on disk
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            StorageError::NothingToCommit(_) | StorageError::OutsideWorkdir { .. }
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_tracked = StorageError::FileNotTracked {
            repo: PathBuf::from("database/SRC"),
            path: PathBuf::from("tables/a.csv"),
        };
        assert!(not_tracked.is_not_found());
        assert!(!not_tracked.is_usage_error());

        let empty = StorageError::NothingToCommit(PathBuf::from("database/SRC"));
        assert!(!empty.is_not_found());
        assert!(empty.is_usage_error());
    }
}
