//! inventory of all tables in a store
//!
//! existence of a table is defined by its row in `inventory.csv`, not by the
//! presence of its file. The index is searched by substring, shell pattern,
//! regex or exact match over the descriptive fields.

mod error;
mod index;
mod pattern;
mod view;

pub use error::{InventoryError, InventoryResult};
pub use index::{read_rows, InventoryIndex, InventoryRow, INVENTORY_HEADER};
pub use pattern::{compile, shell_pattern_to_regex, FieldFilter};
pub use view::QueryResultView;
