//! Catalog module for the sources of a store.
//!
//! The catalog keeps one row per data source in `sources.csv`, together with
//! the last commit of that source's repository. [`RepositoryManager`] owns the
//! repositories themselves and keeps the two in agreement.

mod error;
mod manager;
mod sources;
mod types;

pub use error::{CatalogError, CatalogResult};
pub use manager::{
    RepositoryManager, StagedChange, DATABASE_DIR, SOURCES_FILE, SOURCE_META_FILE,
    SOURCE_SUBFOLDERS, TABLES_DIR,
};
pub use sources::{SourceCatalog, SourceRecord, SOURCES_HEADER};
pub use types::{RepoId, SourceId, MAIN};
