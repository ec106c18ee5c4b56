//! Store configuration.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::error::{StoreError, StoreResult};

/// Placeholder replaced by the source ID in a remote URL template.
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Store configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the store.
    pub path: PathBuf,
    /// Reject every mutating operation.
    pub read_only: bool,
    /// Bootstrap an empty store if `path` holds none.
    pub create_if_missing: bool,
    /// Identity stamped into commit messages and table metadata.
    pub cruncher: String,
    /// Remote repository URL template used by import/export.
    pub remote_url: Option<String>,
    /// Directory checked by `get_table` for tables missing from the inventory.
    pub local_data_dir: PathBuf,
    /// Mapping directory overriding `<path>/mappings`.
    pub mappings_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("datashelf"),
            read_only: false,
            create_if_missing: true,
            cruncher: default_cruncher(),
            remote_url: None,
            local_data_dir: PathBuf::from("data"),
            mappings_dir: None,
        }
    }
}

fn default_cruncher() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "datashelf".to_string())
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl StoreConfig {
    /// Create a new configuration for the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Read `DATASHELF_PATH`, `DATASHELF_CRUNCHER`, `DATASHELF_REMOTE` and
    /// `DATASHELF_READ_ONLY` on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("DATASHELF_PATH") {
            config.path = PathBuf::from(path);
        }
        if let Ok(cruncher) = env::var("DATASHELF_CRUNCHER") {
            config.cruncher = cruncher;
        }
        if let Ok(remote) = env::var("DATASHELF_REMOTE") {
            config.remote_url = Some(remote);
        }
        if let Ok(read_only) = env::var("DATASHELF_READ_ONLY") {
            config.read_only = flag(&read_only);
        }
        config
    }

    /// Load a JSON settings file; missing keys keep their defaults.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.cruncher.trim().is_empty() {
            return Err(StoreError::Config("cruncher must not be empty".to_string()));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::Config("path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn cruncher(mut self, name: impl Into<String>) -> Self {
        self.cruncher = name.into();
        self
    }

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn local_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_data_dir = dir.into();
        self
    }

    pub fn mappings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mappings_dir = Some(dir.into());
        self
    }

    /// Remote URL of a source: the template with `{source}` substituted, or
    /// `<remote><source>.git` when the template has no placeholder.
    pub fn remote_url_for(&self, source: &str) -> StoreResult<String> {
        let template = self
            .remote_url
            .as_deref()
            .ok_or_else(|| StoreError::Config("no remote url configured".to_string()))?;
        if template.contains(SOURCE_PLACEHOLDER) {
            Ok(template.replace(SOURCE_PLACEHOLDER, source))
        } else {
            Ok(format!("{}{}.git", template, source))
        }
    }
}
