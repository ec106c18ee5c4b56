//! High-level store API.
//!
//! [`Store`] ties the table model, the inventory and the repository manager
//! together: it validates tables, writes them into their source repository,
//! keeps `inventory.csv` current and commits every change through the
//! manager's commit protocol.

mod access_log;
mod api;
mod config;
mod error;
mod layout;
mod sandbox;

pub use access_log::TableAccessLogger;
pub use api::{CommitOptions, IdReport, Store, StoreInfo};
pub use config::{StoreConfig, SOURCE_PLACEHOLDER};
pub use error::{StoreError, StoreResult};
pub use layout::{
    create_empty_store, init_store, is_initialized, INVENTORY_FILE, MAPPINGS_DIR, RAWDATA_DIR,
    SOURCE_INVENTORY_FILE,
};
pub use sandbox::{sandbox_tables, SANDBOX_SOURCES};
