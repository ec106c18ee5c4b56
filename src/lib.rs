//! datashelf - a Git-backed store for versioned region-by-year tables
//!
//! Every data source lives in its own git repository under `database/`, and a
//! main repository tracks the source catalog (`sources.csv`, with the last
//! commit of each source) and the table inventory (`inventory.csv`). Every
//! change is a commit, and a store refuses to open when a source repository
//! has drifted from the hash its catalog recorded.
//!
//! # Example
//!
//! ```no_run
//! use datashelf::catalog::{SourceId, SourceRecord};
//! use datashelf::db::Store;
//! use datashelf::table::{DataTable, TableMeta};
//!
//! let mut store = Store::open("./my_shelf").unwrap();
//! let meta = TableMeta::from_pairs([
//!     ("entity", "Emissions|CO2"),
//!     ("scenario", "Historic"),
//!     ("source", "SRC_2020"),
//!     ("unit", "Mt CO2"),
//! ]);
//! let table = DataTable::new(vec!["ZAF".into()], vec![2020], vec![vec![Some(450.0)]], meta).unwrap();
//! let source = SourceRecord::new(SourceId::new("SRC_2020").unwrap());
//! store.commit_table(table, "add emissions", Some(source)).unwrap();
//! ```

pub mod catalog;
pub mod db;
pub mod inventory;
pub mod storage;
pub mod table;
