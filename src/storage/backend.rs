//! The narrow version-control interface the rest of the crate depends on.
//!
//! A repository is treated as an append-only commit log plus a working-tree
//! snapshot. Everything above the storage layer talks to this trait and never
//! to `git2` directly.

use std::path::Path;

use crate::storage::commit::CommitInfo;
use crate::storage::error::StorageResult;
use crate::storage::types::{CommitId, GitSignature};

/// Operations needed from one version-controlled working directory.
pub trait VersionControl: Sized {
    /// Create a fresh repository at `path` (the directory is created if needed).
    fn init(path: &Path) -> StorageResult<Self>;

    /// Open an existing repository at `path`.
    fn open(path: &Path) -> StorageResult<Self>;

    /// Clone `url` into `path`.
    fn clone_from(url: &str, path: &Path) -> StorageResult<Self>;

    /// Root of the working tree.
    fn path(&self) -> &Path;

    /// True if the working tree has modified, deleted or untracked files
    /// relative to the last commit.
    fn is_dirty(&self) -> StorageResult<bool>;

    /// Mark a file for inclusion in the next commit.
    fn stage_file(&self, path: &Path) -> StorageResult<()>;

    /// Mark a tracked file for deletion in the next commit.
    fn stage_removal(&self, path: &Path) -> StorageResult<()>;

    /// Put a file back into its committed state, in the index and in the
    /// working tree. A file absent from HEAD is unstaged and deleted.
    fn restore_file(&self, path: &Path) -> StorageResult<()>;

    /// Number of paths staged since the last commit.
    fn staged_count(&self) -> usize;

    /// Commit everything staged.
    fn commit(&self, message: &str, author: &GitSignature) -> StorageResult<CommitId>;

    /// Current commit hash.
    fn head_hash(&self) -> StorageResult<CommitId>;

    /// Commits reachable from HEAD, newest first.
    fn history(&self, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>>;

    /// Configure `origin` to point at `url` unless it already exists.
    /// Returns false if the remote was already present.
    fn ensure_remote(&self, url: &str) -> StorageResult<bool>;

    /// Push the current branch to `origin`.
    fn push(&self) -> StorageResult<()>;

    /// Fetch `origin` and fast-forward the current branch.
    fn pull(&self) -> StorageResult<CommitId>;
}
