//! The `sources.csv` catalog and per-source `meta.csv` files.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::types::SourceId;

/// Column order of `sources.csv`.
pub const SOURCES_HEADER: [&str; 6] = [
    "SOURCE_ID",
    "collected_by",
    "date",
    "source_url",
    "licence",
    "git_commit_hash",
];

/// One row of the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "SOURCE_ID")]
    pub source_id: SourceId,
    #[serde(default)]
    pub collected_by: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub licence: String,
    /// Last commit of the source repository; `None` until its first commit.
    #[serde(default)]
    pub git_commit_hash: Option<String>,
}

impl SourceRecord {
    /// A record dated today with everything else empty.
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            collected_by: String::new(),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            source_url: String::new(),
            licence: String::new(),
            git_commit_hash: None,
        }
    }

    pub fn with_collected_by(mut self, who: impl Into<String>) -> Self {
        self.collected_by = who.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_licence(mut self, licence: impl Into<String>) -> Self {
        self.licence = licence.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Key/value pairs written to `meta.csv`; the commit hash is left out
    /// since the file lives inside the repository it would describe.
    pub fn meta_pairs(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("SOURCE_ID", self.source_id.as_str()),
            ("collected_by", &self.collected_by),
            ("date", &self.date),
            ("source_url", &self.source_url),
            ("licence", &self.licence),
        ]
    }

    /// Write the `key,value` metadata file of a source.
    pub fn write_meta_file(&self, path: &Path) -> CatalogResult<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(path)?;
        for (key, value) in self.meta_pairs() {
            wtr.write_record([key, value])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read a `key,value` metadata file. Unknown keys are ignored.
    pub fn read_meta_file(path: &Path) -> CatalogResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut pairs = BTreeMap::new();
        for record in rdr.records() {
            let record = record?;
            if let Some(key) = record.get(0) {
                pairs.insert(key.to_string(), record.get(1).unwrap_or("").to_string());
            }
        }

        let id = pairs.remove("SOURCE_ID").ok_or_else(|| CatalogError::Format {
            path: path.to_path_buf(),
            reason: "missing SOURCE_ID".to_string(),
        })?;
        let mut take = |key: &str| pairs.remove(key).unwrap_or_default();
        Ok(Self {
            source_id: SourceId::new(id)?,
            collected_by: take("collected_by"),
            date: take("date"),
            source_url: take("source_url"),
            licence: take("licence"),
            git_commit_hash: None,
        })
    }
}

/// All sources of a store, keyed and ordered by source ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCatalog {
    records: BTreeMap<SourceId, SourceRecord>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `sources.csv`. A duplicated SOURCE_ID is a format error.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let file = File::open(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut catalog = Self::new();
        for record in rdr.deserialize() {
            let record: SourceRecord = record?;
            let id = record.source_id.clone();
            if catalog.records.insert(id.clone(), record).is_some() {
                return Err(CatalogError::Format {
                    path: path.to_path_buf(),
                    reason: format!("duplicate SOURCE_ID {}", id),
                });
            }
        }
        Ok(catalog)
    }

    /// Overwrite `sources.csv` with the in-memory catalog.
    pub fn persist(&self, path: &Path) -> CatalogResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(path)?;
        wtr.write_record(SOURCES_HEADER)?;
        for record in self.records.values() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SourceRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Register a new source.
    pub fn insert(&mut self, record: SourceRecord) -> CatalogResult<()> {
        if self.records.contains_key(&record.source_id) {
            return Err(CatalogError::SourceExists(record.source_id.to_string()));
        }
        self.records.insert(record.source_id.clone(), record);
        Ok(())
    }

    pub fn remove(&mut self, id: &SourceId) -> Option<SourceRecord> {
        self.records.remove(id)
    }

    /// Record the latest commit of a source.
    pub fn set_hash(&mut self, id: &SourceId, hash: Option<String>) -> CatalogResult<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CatalogError::UnknownSource(id.to_string()))?;
        record.git_commit_hash = hash;
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str) -> SourceRecord {
        SourceRecord::new(SourceId::new(id).unwrap())
            .with_collected_by("jdoe")
            .with_date("2020-01-01")
            .with_url("https://example.org/data")
            .with_licence("CC-BY, 4.0")
    }

    #[test]
    fn test_empty_catalog_is_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");
        SourceCatalog::new().persist(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SOURCE_ID,collected_by,date,source_url,licence,git_commit_hash\n"
        );
        assert!(SourceCatalog::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");

        let mut catalog = SourceCatalog::new();
        catalog.insert(record("SRC_2020")).unwrap();
        catalog.insert(record("ABC_2019")).unwrap();
        let id = SourceId::new("SRC_2020").unwrap();
        catalog.set_hash(&id, Some("0123abcd".into())).unwrap();
        catalog.persist(&path).unwrap();

        let loaded = SourceCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(
            loaded.ids().map(SourceId::as_str).collect::<Vec<_>>(),
            vec!["ABC_2019", "SRC_2020"]
        );
        assert_eq!(loaded.get("ABC_2019").unwrap().git_commit_hash, None);
        assert_eq!(
            loaded.get("SRC_2020").unwrap().git_commit_hash.as_deref(),
            Some("0123abcd")
        );
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut catalog = SourceCatalog::new();
        catalog.insert(record("SRC_2020")).unwrap();
        assert!(matches!(
            catalog.insert(record("SRC_2020")),
            Err(CatalogError::SourceExists(_))
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_duplicate_rows_on_disk_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(
            &path,
            "SOURCE_ID,collected_by,date,source_url,licence,git_commit_hash\nA,,,,,\nA,,,,,\n",
        )
        .unwrap();
        assert!(matches!(
            SourceCatalog::load(&path),
            Err(CatalogError::Format { .. })
        ));
    }

    #[test]
    fn test_meta_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.csv");
        let mut rec = record("SRC_2020");
        rec.write_meta_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("SOURCE_ID,SRC_2020\n"));
        assert!(!text.contains("git_commit_hash"));

        rec.git_commit_hash = None;
        assert_eq!(SourceRecord::read_meta_file(&path).unwrap(), rec);
    }

    #[test]
    fn test_meta_file_without_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.csv");
        fs::write(&path, "licence,MIT\n").unwrap();
        assert!(matches!(
            SourceRecord::read_meta_file(&path),
            Err(CatalogError::Format { .. })
        ));
    }
}
