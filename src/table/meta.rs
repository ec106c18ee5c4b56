//! Table metadata and table-ID generation.
//!
//! A table ID is built from three structural fields joined by
//! [`ID_SEPARATOR`]:
//!
//! ```text
//! variable  = entity|category
//! pathway   = scenario|model
//! source    = source_name_source_year
//! ID        = variable__pathway__source
//! ```
//!
//! Sub-fields are joined with [`SUB_SEPARATOR`]; empty sub-fields are skipped.

use std::collections::BTreeMap;
use std::fmt;

use crate::table::error::{TableError, TableResult};

/// Separator between the structural fields of a table ID.
pub const ID_SEPARATOR: &str = "__";

/// Separator between the sub-fields of `variable` and `pathway`.
pub const SUB_SEPARATOR: char = '|';

/// Structural fields, in ID order.
pub const ID_FIELDS: [&str; 3] = ["variable", "pathway", "source"];

/// Metadata key holding the generated ID.
pub const ID_KEY: &str = "ID";

/// Metadata key stamped with the committing user.
pub const CREATOR_KEY: &str = "creator";

/// Key/value metadata attached to a table.
///
/// Empty values are treated as absent by every accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMeta(BTreeMap<String, String>);

impl TableMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Get a non-empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All entries in key order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn source(&self) -> Option<&str> {
        self.get("source")
    }

    pub fn unit(&self) -> &str {
        self.get("unit").unwrap_or("")
    }

    /// The ID recorded by the last call to [`TableMeta::assign_id`].
    pub fn id(&self) -> Option<&str> {
        self.get(ID_KEY)
    }

    /// Drop empty entries and recompute the composite fields.
    ///
    /// Applying this twice gives the same result as applying it once.
    pub fn derive_fields(&mut self) {
        self.0.retain(|_, v| !v.trim().is_empty());

        if let Some(variable) = self.join(&["entity", "category"], SUB_SEPARATOR) {
            self.set("variable", variable);
        }
        if let Some(pathway) = self.join(&["scenario", "model"], SUB_SEPARATOR) {
            self.set("pathway", pathway);
        }

        if let Some(source) = self.join(&["source_name", "source_year"], '_') {
            self.set("source", source);
        } else if let Some((name, year)) = self.source().and_then(split_source) {
            let (name, year) = (name.to_string(), year.to_string());
            self.set("source_name", name);
            self.set("source_year", year);
        }
    }

    fn join(&self, keys: &[&str], separator: char) -> Option<String> {
        let parts: Vec<&str> = keys.iter().filter_map(|k| self.get(k)).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(&separator.to_string()))
        }
    }

    /// Compute the table ID without touching `self`.
    pub fn generate_id(&self) -> TableResult<String> {
        let mut derived = self.clone();
        derived.derive_fields();
        if !derived.contains("entity") {
            return Err(TableError::MissingMeta("entity"));
        }
        if !derived.contains("source") {
            return Err(TableError::MissingMeta("source"));
        }
        let fields: Vec<&str> = ID_FIELDS
            .iter()
            .map(|field| derived.get(field).unwrap_or(""))
            .collect();
        Ok(fields.join(ID_SEPARATOR))
    }

    /// Derive the composite fields, generate the ID and record it under `ID`.
    pub fn assign_id(&mut self) -> TableResult<String> {
        let id = self.generate_id()?;
        self.derive_fields();
        self.set(ID_KEY, id.clone());
        Ok(id)
    }
}

impl fmt::Display for TableMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.0 {
            writeln!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}

/// Split `NAME_YYYY` into name and year.
fn split_source(source: &str) -> Option<(&str, &str)> {
    let (name, year) = source.rsplit_once('_')?;
    if !name.is_empty() && !year.is_empty() && year.chars().all(|c| c.is_ascii_digit()) {
        Some((name, year))
    } else {
        None
    }
}

/// The source of a table, i.e. the last structural field of its ID.
pub fn source_of_id(id: &str) -> &str {
    id.rsplit(ID_SEPARATOR).next().unwrap_or(id)
}

/// File name of a table inside `database/<source>/tables/`.
///
/// Sub-field separators and path separators are not filesystem-safe
/// everywhere and are replaced by `-`.
pub fn table_file_name(id: &str) -> String {
    let mut name: String = id
        .chars()
        .map(|c| match c {
            SUB_SEPARATOR | '/' | '\\' => '-',
            other => other,
        })
        .collect();
    name.push_str(".csv");
    name
}
