//! Result of an inventory search.

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;

use crate::inventory::index::InventoryRow;

/// Columns shown by [`QueryResultView::short`].
const SHORT_COLUMNS: [&str; 6] = ["entity", "category", "scenario", "model", "source", "unit"];

/// Rows matched by a search, with presentation helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResultView {
    rows: Vec<InventoryRow>,
}

impl QueryResultView {
    pub fn new(rows: Vec<InventoryRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryRow> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[InventoryRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<InventoryRow> {
        self.rows
    }

    /// Table IDs in result order.
    pub fn ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.id.as_str()).collect()
    }

    /// Keep only the rows satisfying `predicate`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&InventoryRow) -> bool,
    {
        Self {
            rows: self.rows.into_iter().filter(predicate).collect(),
        }
    }

    /// Compact fixed-width listing without the composite fields.
    pub fn short(&self) -> String {
        let cells: Vec<[&str; 6]> = self
            .rows
            .iter()
            .map(|r| [&r.entity, &r.category, &r.scenario, &r.model, &r.source, &r.unit].map(String::as_str))
            .collect();

        let mut widths = SHORT_COLUMNS.map(str::len);
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        let line = |out: &mut String, values: &[&str; 6]| {
            let parts: Vec<String> = values
                .iter()
                .zip(widths)
                .map(|(v, w)| format!("{:<w$}", v, w = w))
                .collect();
            let _ = writeln!(out, "{}", parts.join("  ").trim_end());
        };
        line(&mut out, &SHORT_COLUMNS);
        for row in &cells {
            line(&mut out, row);
        }
        out
    }

    /// Graphviz description linking each source to its variables and each
    /// variable to its pathways.
    pub fn graph(&self) -> String {
        let mut edges = BTreeSet::new();
        for row in &self.rows {
            edges.insert((row.source.as_str(), row.variable.as_str()));
            if !row.pathway.is_empty() {
                edges.insert((row.variable.as_str(), row.pathway.as_str()));
            }
        }

        let mut out = String::from("digraph inventory {\n    rankdir=LR;\n");
        for (from, to) in edges {
            let _ = writeln!(out, "    {:?} -> {:?};", from, to);
        }
        out.push_str("}\n");
        out
    }
}

impl fmt::Display for QueryResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}  [{}]", row.id, row.unit)?;
        }
        write!(f, "{} table(s)", self.rows.len())
    }
}

impl IntoIterator for QueryResultView {
    type Item = InventoryRow;
    type IntoIter = std::vec::IntoIter<InventoryRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
