//! storage layer for datashelf
//!
//! this module provides the abstraction over git used by every repository of a
//! store: one per data source plus the umbrella "main" repository. The upper
//! layers (repository manager, store) use the [`VersionControl`] trait and never
//! touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 VersionControl (trait)                      │
//! │  (init/open/clone, dirty check, stage, commit, head hash)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                     ┌─────────────────┐
//!                     │  GitRepository  │
//!                     │  (git2 adapter) │
//!                     └─────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌─────────────┐               ┌─────────────┐
//!        │   commit    │               │  progress   │
//!        │  (history)  │               │ (transfers) │
//!        └─────────────┘               └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use datashelf::storage::{GitRepository, GitSignature, VersionControl};
//!
//! let repo = GitRepository::init(Path::new("./database/SRC_2020"))?;
//! std::fs::write("./database/SRC_2020/meta.csv", "SOURCE_ID,SRC_2020\n")?;
//! repo.stage_file(Path::new("meta.csv"))?;
//! let head = repo.commit("added source", &GitSignature::for_cruncher("jdoe"))?;
//! assert!(!repo.is_dirty()?);
//! ```

mod backend;
mod commit;
mod error;
mod progress;
mod repository;
mod types;

// Re-export public API
pub use backend::VersionControl;
pub use commit::{CommitInfo, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use progress::TransferProgress;
pub use repository::{GitRepository, ORIGIN};
pub use types::{CommitId, GitSignature};
