//! The inventory: one searchable row per stored table.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::inventory::error::{InventoryError, InventoryResult};
use crate::inventory::pattern::{self, FieldFilter};
use crate::inventory::view::QueryResultView;
use crate::table::{TableMeta, SUB_SEPARATOR};

/// Column order of `inventory.csv` and `source_inventory.csv`.
pub const INVENTORY_HEADER: [&str; 11] = [
    "ID",
    "variable",
    "entity",
    "category",
    "pathway",
    "scenario",
    "model",
    "source",
    "source_name",
    "source_year",
    "unit",
];

/// Searchable fields of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub pathway: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_year: String,
    #[serde(default)]
    pub unit: String,
}

impl InventoryRow {
    /// Row for table `id` from its (derived) metadata.
    pub fn from_meta(id: &str, meta: &TableMeta) -> Self {
        let mut meta = meta.clone();
        meta.derive_fields();
        let get = |key: &str| meta.get(key).unwrap_or("").to_string();
        Self {
            id: id.to_string(),
            variable: get("variable"),
            entity: get("entity"),
            category: get("category"),
            pathway: get("pathway"),
            scenario: get("scenario"),
            model: get("model"),
            source: get("source"),
            source_name: get("source_name"),
            source_year: get("source_year"),
            unit: get("unit"),
        }
    }

    /// Value of a field by its column name.
    pub fn field(&self, name: &str) -> InventoryResult<&str> {
        let value = match name {
            "ID" | "id" => &self.id,
            "variable" => &self.variable,
            "entity" => &self.entity,
            "category" => &self.category,
            "pathway" => &self.pathway,
            "scenario" => &self.scenario,
            "model" => &self.model,
            "source" => &self.source,
            "source_name" => &self.source_name,
            "source_year" => &self.source_year,
            "unit" => &self.unit,
            other => return Err(InventoryError::UnknownField(other.to_string())),
        };
        Ok(value)
    }

    /// Depth of the variable, i.e. its number of sub-field separators.
    pub fn level(&self) -> usize {
        self.variable.matches(SUB_SEPARATOR).count()
    }
}

/// In-memory inventory keyed and ordered by table ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryIndex {
    rows: BTreeMap<String, InventoryRow>,
}

impl InventoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an inventory file.
    pub fn load(path: &Path) -> InventoryResult<Self> {
        let mut index = Self::new();
        index.merge(read_rows(path)?);
        debug!("loaded {} inventory rows from {}", index.len(), path.display());
        Ok(index)
    }

    /// Overwrite `path` with the full inventory.
    pub fn persist(&self, path: &Path) -> InventoryResult<()> {
        write_rows(path, self.rows.values())
    }

    /// Write the rows of one source, e.g. `source_inventory.csv`.
    pub fn persist_source(&self, source: &str, path: &Path) -> InventoryResult<()> {
        write_rows(path, self.rows.values().filter(|r| r.source == source))
    }

    /// Insert a row, replacing any row with the same ID.
    pub fn add(&mut self, row: InventoryRow) {
        self.rows.insert(row.id.clone(), row);
    }

    /// Insert or replace many rows.
    pub fn merge(&mut self, rows: impl IntoIterator<Item = InventoryRow>) {
        for row in rows {
            self.add(row);
        }
    }

    pub fn remove(&mut self, id: &str) -> InventoryResult<InventoryRow> {
        self.rows
            .remove(id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))
    }

    /// Drop every row of a source, returning the removed IDs.
    pub fn remove_source(&mut self, source: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .rows
            .values()
            .filter(|r| r.source == source)
            .map(|r| r.id.clone())
            .collect();
        for id in &ids {
            self.rows.remove(id);
        }
        ids
    }

    pub fn get(&self, id: &str) -> Option<&InventoryRow> {
        self.rows.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows per source.
    pub fn count_by_source(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in self.rows.values() {
            *counts.entry(row.source.as_str()).or_insert(0) += 1;
        }
        counts
    }

    fn select<F>(&self, filters: &[FieldFilter], mut keep: F) -> InventoryResult<QueryResultView>
    where
        F: FnMut(usize, &str) -> bool,
    {
        // reject unknown fields even on an empty inventory
        let blank = InventoryRow::default();
        for filter in filters {
            blank.field(&filter.field)?;
        }

        let mut rows = Vec::new();
        'rows: for row in self.rows.values() {
            for (i, filter) in filters.iter().enumerate() {
                if !keep(i, row.field(&filter.field)?) {
                    continue 'rows;
                }
            }
            rows.push(row.clone());
        }
        Ok(QueryResultView::new(rows))
    }

    /// Rows whose fields contain the given substrings.
    pub fn find(&self, filters: &[FieldFilter]) -> InventoryResult<QueryResultView> {
        self.select(filters, |i, value| value.contains(filters[i].value.as_str()))
    }

    /// Rows whose fields equal the given values.
    pub fn find_exact(&self, filters: &[FieldFilter]) -> InventoryResult<QueryResultView> {
        self.select(filters, |i, value| value == filters[i].value)
    }

    /// Rows whose fields match shell patterns (or regexes with `use_regex`),
    /// optionally restricted to variables of the given depth.
    pub fn find_pattern(
        &self,
        filters: &[FieldFilter],
        use_regex: bool,
        level: Option<usize>,
    ) -> InventoryResult<QueryResultView> {
        let patterns: Vec<Regex> = filters
            .iter()
            .map(|f| pattern::compile(&f.value, use_regex))
            .collect::<InventoryResult<_>>()?;
        let view = self.select(filters, |i, value| patterns[i].is_match(value))?;
        Ok(match level {
            Some(level) => view.filter(|row| row.level() == level),
            None => view,
        })
    }
}

/// Read inventory rows from a file.
pub fn read_rows(path: &Path) -> InventoryResult<Vec<InventoryRow>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let rows = rdr.deserialize().collect::<Result<Vec<InventoryRow>, _>>()?;
    Ok(rows)
}

fn write_rows<'a>(
    path: &Path,
    rows: impl Iterator<Item = &'a InventoryRow>,
) -> InventoryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    wtr.write_record(INVENTORY_HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
