//! Consistency check run on every table before it is persisted.

use std::collections::BTreeSet;

use log::debug;

use crate::table::data::{Cell, DataTable};
use crate::table::error::{InvalidReason, TableError, TableResult};
use crate::table::spatial::SpatialIds;

/// Check that a table may be stored.
///
/// Rules, in the order they are checked:
/// 1. every cell is numeric or missing
/// 2. every row label is a known spatial identifier
/// 3. every column label is an integer year
/// 4. no row label appears twice
pub fn check_consistency(table: &DataTable, spatial: &SpatialIds) -> TableResult<()> {
    let id = table
        .id()
        .map(str::to_string)
        .or_else(|| table.meta.generate_id().ok())
        .unwrap_or_else(|| "<unidentified>".to_string());
    let invalid = |reason| TableError::Invalid {
        id: id.clone(),
        reason,
    };

    for (region, cells) in table.rows() {
        for (column, cell) in table.columns().iter().zip(cells) {
            if let Cell::Text(value) = cell {
                return Err(invalid(InvalidReason::NonNumeric {
                    region: region.to_string(),
                    column: column.clone(),
                    value: value.clone(),
                }));
            }
        }
    }

    let unknown: BTreeSet<String> = table
        .regions()
        .iter()
        .filter(|r| !spatial.contains(r))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(invalid(InvalidReason::UnknownSpatialIds(
            unknown.into_iter().collect(),
        )));
    }

    let non_integer: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.trim().parse::<i32>().is_err())
        .cloned()
        .collect();
    if !non_integer.is_empty() {
        return Err(invalid(InvalidReason::NonIntegerColumns(non_integer)));
    }

    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<String> = table
        .regions()
        .iter()
        .filter(|r| !seen.insert(r.as_str()))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(invalid(InvalidReason::DuplicateRows(
            duplicates.into_iter().collect(),
        )));
    }

    debug!("table {} passed the consistency check", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::meta::TableMeta;

    fn spatial() -> SpatialIds {
        ["ZAF", "DEU", "World"].into_iter().collect()
    }

    fn meta() -> TableMeta {
        TableMeta::from_pairs([("entity", "GDP"), ("source", "WDI_2021")])
    }

    fn build(regions: &[&str], columns: &[&str], cells: Vec<Vec<Cell>>) -> DataTable {
        DataTable::from_cells(
            regions.iter().map(|s| s.to_string()).collect(),
            columns.iter().map(|s| s.to_string()).collect(),
            cells,
            meta(),
        )
        .unwrap()
    }

    fn reason(table: &DataTable) -> InvalidReason {
        match check_consistency(table, &spatial()) {
            Err(TableError::Invalid { reason, .. }) => reason,
            other => panic!("expected invalid table, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_table() {
        let t = build(&["ZAF", "World"], &["2000"], vec![vec![Cell::Number(1.0)], vec![Cell::Missing]]);
        assert!(check_consistency(&t, &spatial()).is_ok());
    }

    #[test]
    fn test_non_numeric() {
        let t = build(&["ZAF"], &["2000"], vec![vec![Cell::Text("n/a".into())]]);
        assert!(matches!(reason(&t), InvalidReason::NonNumeric { .. }));
    }

    #[test]
    fn test_unknown_spatial_id() {
        let t = build(&["ZAF", "XXX"], &["2000"], vec![vec![Cell::Missing], vec![Cell::Missing]]);
        assert_eq!(reason(&t), InvalidReason::UnknownSpatialIds(vec!["XXX".into()]));
    }

    #[test]
    fn test_non_integer_columns() {
        let t = build(&["ZAF"], &["2000", "2000.5"], vec![vec![Cell::Missing, Cell::Missing]]);
        assert_eq!(reason(&t), InvalidReason::NonIntegerColumns(vec!["2000.5".into()]));
    }

    #[test]
    fn test_duplicate_rows() {
        let t = build(&["ZAF", "ZAF"], &["2000"], vec![vec![Cell::Missing], vec![Cell::Missing]]);
        let r = reason(&t);
        assert_eq!(r, InvalidReason::DuplicateRows(vec!["ZAF".into()]));
    }

    #[test]
    fn test_error_names_the_table() {
        let t = build(&["XXX"], &["2000"], vec![vec![Cell::Missing]]);
        let err = check_consistency(&t, &spatial()).unwrap_err();
        assert!(err.to_string().contains("GDP____WDI_2021"));
    }
}
