//! Two-dimensional region x year tables.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use log::warn;

use crate::table::error::{TableError, TableResult};
use crate::table::meta::{TableMeta, ID_KEY};
use crate::table::spatial::SpatialIds;

/// One cell of a table.
///
/// `Text` only exists for values read from disk that do not parse as numbers;
/// the consistency check rejects any table holding one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parse a raw CSV field.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Missing;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Missing,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => Cell::Number(v),
            _ => Cell::Missing,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Order column labels as years: integer labels numerically, anything else
/// after them in lexical order.
pub(crate) fn compare_columns(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// A table keyed by spatial identifier (rows) and year (columns), with
/// attached metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    regions: Vec<String>,
    columns: Vec<String>,
    // row-major, regions.len() * columns.len()
    cells: Vec<Cell>,
    pub meta: TableMeta,
}

impl DataTable {
    /// Build a numeric table from per-region rows of optional values.
    pub fn new(
        regions: Vec<String>,
        years: Vec<i32>,
        values: Vec<Vec<Option<f64>>>,
        meta: TableMeta,
    ) -> TableResult<Self> {
        let columns = years.iter().map(|y| y.to_string()).collect();
        let cells = values
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect())
            .collect();
        Self::from_cells(regions, columns, cells, meta)
    }

    /// Build a table from raw labels and cells, checking only the shape.
    pub fn from_cells(
        regions: Vec<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
        meta: TableMeta,
    ) -> TableResult<Self> {
        let shape_error = |found: String| TableError::Shape {
            rows: regions.len(),
            columns: columns.len(),
            found,
        };
        if rows.len() != regions.len() {
            return Err(shape_error(format!("{} rows", rows.len())));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(shape_error(format!("a row of {} values", bad.len())));
        }

        let cells = rows.into_iter().flatten().collect();
        Ok(Self {
            regions,
            columns,
            cells,
            meta,
        })
    }

    /// An empty table carrying only metadata.
    pub fn empty(meta: TableMeta) -> Self {
        Self {
            regions: Vec::new(),
            columns: Vec::new(),
            cells: Vec::new(),
            meta,
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column labels that parse as integer years.
    pub fn years(&self) -> Vec<i32> {
        self.columns
            .iter()
            .filter_map(|c| c.trim().parse().ok())
            .collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.regions.len(), self.columns.len())
    }

    /// ID recorded in the metadata, if the table has been identified.
    pub fn id(&self) -> Option<&str> {
        self.meta.id()
    }

    /// Cell at row `r`, column `c`.
    pub fn cell(&self, r: usize, c: usize) -> &Cell {
        &self.cells[r * self.columns.len() + c]
    }

    /// Iterate over the rows as `(region, cells)`.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        let width = self.columns.len();
        self.regions
            .iter()
            .enumerate()
            .map(move |(i, region)| (region.as_str(), &self.cells[i * width..(i + 1) * width]))
    }

    fn row_index(&self, region: &str) -> Option<usize> {
        self.regions.iter().position(|r| r == region)
    }

    fn column_index(&self, year: i32) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().parse::<i32>().ok() == Some(year))
    }

    /// Numeric value for `region` in `year`.
    pub fn value(&self, region: &str, year: i32) -> Option<f64> {
        let r = self.row_index(region)?;
        let c = self.column_index(year)?;
        self.cell(r, c).as_f64()
    }

    /// Set a value, adding the row or column if needed.
    pub fn set_value(&mut self, region: &str, year: i32, value: Option<f64>) {
        let r = match self.row_index(region) {
            Some(r) => r,
            None => {
                self.regions.push(region.to_string());
                self.cells
                    .extend(std::iter::repeat(Cell::Missing).take(self.columns.len()));
                self.regions.len() - 1
            }
        };
        let c = match self.column_index(year) {
            Some(c) => c,
            None => {
                self.insert_column(year.to_string());
                self.columns.len() - 1
            }
        };
        let width = self.columns.len();
        self.cells[r * width + c] = Cell::from(value);
    }

    fn insert_column(&mut self, label: String) {
        let old_width = self.columns.len();
        let mut cells = Vec::with_capacity(self.regions.len() * (old_width + 1));
        for r in 0..self.regions.len() {
            cells.extend_from_slice(&self.cells[r * old_width..(r + 1) * old_width]);
            cells.push(Cell::Missing);
        }
        self.columns.push(label);
        self.cells = cells;
    }

    /// True if the table holds no value at all.
    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }

    /// Derive the metadata composites, generate the table ID and record it.
    pub fn generate_table_id(&mut self) -> TableResult<String> {
        self.meta.assign_id()
    }

    /// Rebuild the table from a selection of row and column indices.
    fn select(&self, rows: &[usize], cols: &[usize]) -> Self {
        let width = self.columns.len();
        let mut cells = Vec::with_capacity(rows.len() * cols.len());
        for &r in rows {
            for &c in cols {
                cells.push(self.cells[r * width + c].clone());
            }
        }
        Self {
            regions: rows.iter().map(|&r| self.regions[r].clone()).collect(),
            columns: cols.iter().map(|&c| self.columns[c].clone()).collect(),
            cells,
            meta: self.meta.clone(),
        }
    }

    /// Canonical on-disk order: rows by label, columns by year.
    pub fn sorted(&self) -> Self {
        let mut rows: Vec<usize> = (0..self.regions.len()).collect();
        rows.sort_by(|&a, &b| self.regions[a].cmp(&self.regions[b]));
        let mut cols: Vec<usize> = (0..self.columns.len()).collect();
        cols.sort_by(|&a, &b| compare_columns(&self.columns[a], &self.columns[b]));
        self.select(&rows, &cols)
    }

    /// Merge with `other`: the union of rows and columns, with `self`'s
    /// non-missing values taking precedence. Metadata comes from `self`.
    pub fn combine_first(&self, other: &DataTable) -> DataTable {
        let mut regions = self.regions.clone();
        for region in &other.regions {
            if !regions.contains(region) {
                regions.push(region.clone());
            }
        }
        let mut columns = self.columns.clone();
        for column in &other.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let lookup = |table: &DataTable| -> HashMap<(String, String), Cell> {
            table
                .rows()
                .flat_map(|(region, cells)| {
                    table
                        .columns
                        .iter()
                        .zip(cells)
                        .map(move |(col, cell)| ((region.to_string(), col.clone()), cell.clone()))
                })
                .collect()
        };
        let primary = lookup(self);
        let secondary = lookup(other);

        let mut cells = Vec::with_capacity(regions.len() * columns.len());
        for region in &regions {
            for column in &columns {
                let key = (region.clone(), column.clone());
                let cell = match primary.get(&key) {
                    Some(cell) if !cell.is_missing() => cell.clone(),
                    _ => secondary.get(&key).cloned().unwrap_or_default(),
                };
                cells.push(cell);
            }
        }

        DataTable {
            regions,
            columns,
            cells,
            meta: self.meta.clone(),
        }
        .sorted()
    }

    /// Drop rows with unknown spatial IDs, all-empty rows and columns, and
    /// empty metadata entries.
    pub fn cleaned(&self, spatial: &SpatialIds) -> DataTable {
        let unknown: BTreeSet<&str> = self
            .regions
            .iter()
            .map(String::as_str)
            .filter(|r| !spatial.contains(r))
            .collect();
        if !unknown.is_empty() {
            warn!(
                "dropping unknown regions from {}: {}",
                self.id().unwrap_or("table"),
                unknown.iter().copied().collect::<Vec<_>>().join(", ")
            );
        }

        let width = self.columns.len();
        let rows: Vec<usize> = (0..self.regions.len())
            .filter(|&r| !unknown.contains(self.regions[r].as_str()))
            .filter(|&r| self.cells[r * width..(r + 1) * width].iter().any(|c| !c.is_missing()))
            .collect();
        let cols: Vec<usize> = (0..width)
            .filter(|&c| rows.iter().any(|&r| !self.cells[r * width + c].is_missing()))
            .collect();

        let mut table = self.select(&rows, &cols);
        let empty_keys: Vec<String> = table
            .meta
            .iter()
            .filter(|(k, v)| *k != ID_KEY && v.trim().is_empty())
            .map(|(k, _)| k.to_string())
            .collect();
        for key in empty_keys {
            table.meta.remove(&key);
        }
        table
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.id().unwrap_or("<no id>"))?;
        write!(f, "{:<8}", "region")?;
        for column in &self.columns {
            write!(f, " {:>10}", column)?;
        }
        writeln!(f)?;
        for (region, cells) in self.rows() {
            write!(f, "{:<8}", region)?;
            for cell in cells {
                write!(f, " {:>10}", cell.to_string())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TableMeta {
        TableMeta::from_pairs([
            ("entity", "Emissions|CO2"),
            ("source", "SRC_2020"),
            ("unit", "Mt CO2"),
        ])
    }

    fn table(regions: &[&str], years: &[i32], values: Vec<Vec<Option<f64>>>) -> DataTable {
        DataTable::new(
            regions.iter().map(|r| r.to_string()).collect(),
            years.to_vec(),
            values,
            meta(),
        )
        .unwrap()
    }

    #[test]
    fn test_shape_is_checked() {
        let err = DataTable::new(
            vec!["ZAF".into()],
            vec![2000, 2001],
            vec![vec![Some(1.0)]],
            meta(),
        )
        .unwrap_err();
        assert!(matches!(err, TableError::Shape { .. }));
    }

    #[test]
    fn test_value_and_set_value() {
        let mut t = table(&["ZAF"], &[2000], vec![vec![Some(1.5)]]);
        assert_eq!(t.value("ZAF", 2000), Some(1.5));
        assert_eq!(t.value("ZAF", 2001), None);

        t.set_value("DEU", 2005, Some(3.0));
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.value("DEU", 2005), Some(3.0));
        assert_eq!(t.value("ZAF", 2005), None);
        assert_eq!(t.value("ZAF", 2000), Some(1.5));
    }

    #[test]
    fn test_sorted_orders_rows_and_years() {
        let t = table(
            &["ZAF", "DEU"],
            &[2010, 2000],
            vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]],
        );
        let s = t.sorted();
        assert_eq!(s.regions(), &["DEU".to_string(), "ZAF".to_string()]);
        assert_eq!(s.years(), vec![2000, 2010]);
        assert_eq!(s.value("DEU", 2000), Some(4.0));
        assert_eq!(s.value("ZAF", 2010), Some(1.0));
    }

    #[test]
    fn test_combine_first_precedence() {
        let new = table(&["ZAF"], &[2000, 2001], vec![vec![Some(10.0), None]]);
        let old = table(
            &["ZAF", "DEU"],
            &[2000, 2001],
            vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), None]],
        );

        let overwrite = new.combine_first(&old);
        assert_eq!(overwrite.value("ZAF", 2000), Some(10.0));
        assert_eq!(overwrite.value("ZAF", 2001), Some(2.0));
        assert_eq!(overwrite.value("DEU", 2000), Some(3.0));

        let append = old.combine_first(&new);
        assert_eq!(append.value("ZAF", 2000), Some(1.0));
        assert_eq!(append.value("ZAF", 2001), Some(2.0));
    }

    #[test]
    fn test_cleaned_drops_unknown_and_empty() {
        let spatial: SpatialIds = ["ZAF", "DEU", "World"].into_iter().collect();
        let mut t = table(
            &["ZAF", "XXX", "DEU"],
            &[2000, 2001],
            vec![
                vec![Some(1.0), None],
                vec![Some(2.0), Some(2.0)],
                vec![None, None],
            ],
        );
        t.meta.set("model", "");

        let c = t.cleaned(&spatial);
        assert_eq!(c.regions(), &["ZAF".to_string()]);
        assert_eq!(c.years(), vec![2000]);
        assert!(c.meta.iter().all(|(k, _)| k != "model"));
    }

    #[test]
    fn test_all_missing() {
        let t = table(&["ZAF"], &[2000], vec![vec![None]]);
        assert!(t.is_all_missing());
        assert!(DataTable::empty(meta()).is_all_missing());
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse(" 2.5 "), Cell::Number(2.5));
        assert_eq!(Cell::parse("n/a"), Cell::Text("n/a".into()));
    }
}
