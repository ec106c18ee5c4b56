//! tabular data layer for datashelf
//!
//! a table is a region x year grid of numbers with a metadata dictionary.
//! The metadata determines the table ID, the ID determines the file name, and
//! the consistency check decides whether the table may be stored at all.

mod codec;
mod data;
mod error;
mod meta;
mod set;
mod spatial;
mod validate;

pub use codec::{from_csv_str, read_table, to_csv_string, write_table, DATA_MARKER, META_MARKER};
pub use data::{Cell, DataTable};
pub use error::{InvalidReason, TableError, TableResult};
pub use meta::{
    source_of_id, table_file_name, TableMeta, CREATOR_KEY, ID_FIELDS, ID_KEY, ID_SEPARATOR,
    SUB_SEPARATOR,
};
pub use set::TableSet;
pub use spatial::{SpatialIds, DEFAULT_MAPPINGS, WORLD};
pub use validate::check_consistency;
