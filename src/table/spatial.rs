//! The universe of known spatial identifiers (countries and regions).
//!
//! Built from the three mapping files kept under `<store>/mappings/`:
//!
//! - `country_codes.csv`: `alpha3,name`
//! - `continent.csv`: `alpha3,continent`
//! - `regions.csv`: `region,alpha3`
//!
//! Every ISO alpha-3 code, continent and region name is a valid row label.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::table::error::{TableError, TableResult};

/// Label that is always valid, whatever the mapping files say.
pub const WORLD: &str = "World";

/// Standard mapping files bundled with the crate, as `(file name, contents)`.
pub const DEFAULT_MAPPINGS: [(&str, &str); 3] = [
    ("regions.csv", include_str!("../../mappings/regions.csv")),
    ("continent.csv", include_str!("../../mappings/continent.csv")),
    ("country_codes.csv", include_str!("../../mappings/country_codes.csv")),
];

#[derive(Debug, Deserialize)]
struct CountryRow {
    alpha3: String,
}

#[derive(Debug, Deserialize)]
struct ContinentRow {
    alpha3: String,
    continent: String,
}

#[derive(Debug, Deserialize)]
struct RegionRow {
    region: String,
    alpha3: String,
}

/// Set of valid spatial identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpatialIds(BTreeSet<String>);

impl SpatialIds {
    /// Load from a mapping directory.
    pub fn load_dir(dir: &Path) -> TableResult<Self> {
        let mut ids = SpatialIds::default();
        ids.insert(WORLD);

        for row in read_rows::<CountryRow>(&dir.join("country_codes.csv"))? {
            ids.insert(&row.alpha3);
        }
        for row in read_rows::<ContinentRow>(&dir.join("continent.csv"))? {
            ids.insert(&row.alpha3);
            ids.insert(&row.continent);
        }
        for row in read_rows::<RegionRow>(&dir.join("regions.csv"))? {
            ids.insert(&row.region);
            ids.insert(&row.alpha3);
        }
        Ok(ids)
    }

    /// The bundled mappings.
    pub fn defaults() -> TableResult<Self> {
        let mut ids = SpatialIds::default();
        ids.insert(WORLD);
        let [regions, continents, countries] = DEFAULT_MAPPINGS;

        for row in parse_rows::<CountryRow>(countries.1.as_bytes())? {
            ids.insert(&row.alpha3);
        }
        for row in parse_rows::<ContinentRow>(continents.1.as_bytes())? {
            ids.insert(&row.alpha3);
            ids.insert(&row.continent);
        }
        for row in parse_rows::<RegionRow>(regions.1.as_bytes())? {
            ids.insert(&row.region);
            ids.insert(&row.alpha3);
        }
        Ok(ids)
    }

    fn insert(&mut self, id: &str) {
        let id = id.trim();
        if !id.is_empty() {
            self.0.insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SpatialIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut ids = SpatialIds::default();
        for id in iter {
            ids.insert(id.as_ref());
        }
        ids
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> TableResult<Vec<T>> {
    let file = File::open(path)?;
    parse_rows(file)
}

fn parse_rows<T: for<'de> Deserialize<'de>>(reader: impl std::io::Read) -> TableResult<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    rdr.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(TableError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_cover_sandbox_regions() {
        let ids = SpatialIds::defaults().unwrap();
        for id in ["World", "Asia", "Europe", "ZAF", "DEU", "USA", "EU28"] {
            assert!(ids.contains(id), "{} missing", id);
        }
        assert!(!ids.contains("XXX"));
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("country_codes.csv"), "alpha3,name\nFRA,France\n").unwrap();
        fs::write(dir.path().join("continent.csv"), "alpha3,continent\nFRA,Europe\n").unwrap();
        fs::write(dir.path().join("regions.csv"), "region,alpha3\nEU,FRA\n").unwrap();

        let ids = SpatialIds::load_dir(dir.path()).unwrap();
        assert_eq!(ids.len(), 4);
        assert!(ids.contains("FRA"));
        assert!(ids.contains("Europe"));
        assert!(ids.contains("EU"));
        assert!(ids.contains(WORLD));
    }

    #[test]
    fn test_load_dir_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SpatialIds::load_dir(dir.path()),
            Err(TableError::Io(_))
        ));
    }
}
