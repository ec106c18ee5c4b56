//! Store API - high-level interface for a datashelf.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::catalog::{
    RepoId, RepositoryManager, SourceCatalog, SourceId, SourceRecord, DATABASE_DIR, TABLES_DIR,
};
use crate::db::access_log::TableAccessLogger;
use crate::db::config::StoreConfig;
use crate::db::error::{StoreError, StoreResult};
use crate::db::layout::{self, INVENTORY_FILE, MAPPINGS_DIR, SOURCE_INVENTORY_FILE};
use crate::db::sandbox::{sandbox_tables, SANDBOX_SOURCES};
use crate::inventory::{read_rows, FieldFilter, InventoryIndex, InventoryRow, QueryResultView};
use crate::storage::{
    CommitId, CommitInfo, CommitMessage, GitRepository, GitSignature, VersionControl,
};
use crate::table::{
    check_consistency, read_table, source_of_id, table_file_name, write_table, DataTable,
    SpatialIds, TableSet, CREATOR_KEY,
};

/// How `commit_tables` treats tables whose ID is already in the inventory.
///
/// With none of `overwrite`, `append` or `update` set such tables are
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    /// Merge with the stored table, new values winning.
    pub overwrite: bool,
    /// Merge with the stored table, stored values winning.
    pub append: bool,
    /// Replace the stored table.
    pub update: bool,
    /// Drop unknown regions and empty rows and columns before committing.
    pub clean_tables: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            append: false,
            update: false,
            clean_tables: true,
        }
    }
}

impl CommitOptions {
    pub fn overwrite(mut self, value: bool) -> Self {
        self.overwrite = value;
        self
    }

    pub fn append(mut self, value: bool) -> Self {
        self.append = value;
        self
    }

    pub fn update(mut self, value: bool) -> Self {
        self.update = value;
        self
    }

    pub fn clean_tables(mut self, value: bool) -> Self {
        self.clean_tables = value;
        self
    }
}

/// The main store handle.
///
/// All writes go through the commit protocol of [`RepositoryManager`]: files
/// are written and staged first, then every touched source repository is
/// committed, then the main repository.
pub struct Store<R: VersionControl = GitRepository> {
    config: StoreConfig,
    manager: RepositoryManager<R>,
    inventory: InventoryIndex,
    spatial: SpatialIds,
}

impl Store<GitRepository> {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(StoreConfig::new(path.as_ref()))
    }

    /// Open or create a store with custom configuration.
    pub fn open_with_config(config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_backend(config)
    }

    /// A throwaway store in a temporary directory, holding two demo sources
    /// with two tables each. The store lives as long as the returned
    /// directory.
    pub fn sandbox() -> StoreResult<(TempDir, Self)> {
        let dir = TempDir::new()?;
        let config = StoreConfig::new(dir.path().join("datashelf")).cruncher("sandbox");
        let mut store = Self::open_with_config(config)?;

        for id in SANDBOX_SOURCES {
            let (tables, record) = sandbox_tables(&SourceId::new(id)?)?;
            store.commit_tables(tables, "sandbox tables", Some(record), CommitOptions::default())?;
        }
        Ok((dir, store))
    }
}

impl<R: VersionControl> Store<R> {
    /// Open a store on any version-control backend, bootstrapping it first
    /// if the path holds none and the configuration allows it.
    pub fn open_with_backend(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = config.path.clone();

        if !layout::is_initialized(&root) {
            if config.read_only || !config.create_if_missing {
                return Err(StoreError::NotInitialized(root));
            }
            layout::init_store::<R>(&root, false)?;
        }

        let manager = RepositoryManager::open(&root, GitSignature::for_cruncher(&config.cruncher))?;
        let inventory = InventoryIndex::load(&root.join(INVENTORY_FILE))?;
        let mappings = config
            .mappings_dir
            .clone()
            .unwrap_or_else(|| root.join(MAPPINGS_DIR));
        let spatial = SpatialIds::load_dir(&mappings)?;

        info!(
            "opened store {} ({} sources, {} tables)",
            root.display(),
            manager.sources().len(),
            inventory.len()
        );
        Ok(Self {
            config,
            manager,
            inventory,
            spatial,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn sources(&self) -> &SourceCatalog {
        self.manager.sources()
    }

    pub fn inventory(&self) -> &InventoryIndex {
        &self.inventory
    }

    pub fn spatial_ids(&self) -> &SpatialIds {
        &self.spatial
    }

    pub fn source_exists(&self, id: &str) -> bool {
        self.manager.source_exists(id)
    }

    /// A table exists iff it has an inventory row.
    pub fn table_exists(&self, id: &str) -> bool {
        self.inventory.contains(id)
    }

    /// Location of a table file, whether or not it exists.
    pub fn table_path(&self, id: &str) -> PathBuf {
        self.path()
            .join(DATABASE_DIR)
            .join(source_of_id(id))
            .join(TABLES_DIR)
            .join(table_file_name(id))
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly(self.path().to_path_buf()));
        }
        Ok(())
    }

    /// Run a mutating operation. On failure, the manager rolls back what the
    /// operation staged and the inventory is reloaded from disk.
    fn mutate<F, T>(&mut self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Self) -> StoreResult<T>,
    {
        self.ensure_writable()?;
        let result = f(self);
        if result.is_err() && self.manager.has_pending() {
            self.manager.rollback();
            match InventoryIndex::load(&self.path().join(INVENTORY_FILE)) {
                Ok(inventory) => self.inventory = inventory,
                Err(e) => warn!("could not reload inventory: {}", e),
            }
        }
        result
    }

    /// Validate a table and give it its ID, creator and canonical order.
    fn prepare(&self, mut table: DataTable) -> StoreResult<(SourceId, String, DataTable)> {
        check_consistency(&table, &self.spatial)?;
        let id = table.generate_table_id()?;
        let source = SourceId::new(source_of_id(&id))?;
        table.meta.set(CREATOR_KEY, self.config.cruncher.as_str());
        Ok((source, id, table.sorted()))
    }

    /// True if `source` must be created from `meta`.
    fn resolve_source(&self, source: &SourceId, meta: Option<&SourceRecord>) -> StoreResult<bool> {
        if self.manager.source_exists(source.as_str()) {
            return Ok(false);
        }
        match meta {
            Some(record) if &record.source_id == source => Ok(true),
            Some(record) => Err(StoreError::SourceMismatch {
                table: source.to_string(),
                meta: record.source_id.to_string(),
            }),
            None => Err(StoreError::UnknownSource(source.to_string())),
        }
    }

    fn write_table_file(&mut self, source: &SourceId, id: &str, table: &DataTable) -> StoreResult<()> {
        let rel = Path::new(TABLES_DIR).join(table_file_name(id));
        write_table(table, &self.manager.source_path(source).join(&rel))?;
        self.manager.stage_file(&RepoId::Source(source.clone()), rel)?;
        self.inventory.add(InventoryRow::from_meta(id, &table.meta));
        debug!("wrote table {}", id);
        Ok(())
    }

    fn stage_table_removal(&mut self, id: &str) -> StoreResult<()> {
        let source = SourceId::new(source_of_id(id))?;
        if !self.manager.source_exists(source.as_str()) {
            return Err(StoreError::UnknownSource(source.to_string()));
        }
        let rel = Path::new(TABLES_DIR).join(table_file_name(id));
        self.manager.stage_removal(&RepoId::Source(source), rel)?;
        self.inventory.remove(id)?;
        debug!("removed table {}", id);
        Ok(())
    }

    /// Flush the inventories and run the commit protocol.
    fn git_commit(&mut self, message: &str) -> StoreResult<CommitId> {
        let pending: Vec<SourceId> = self.manager.pending_sources().cloned().collect();
        for source in pending {
            let path = self.manager.source_path(&source).join(SOURCE_INVENTORY_FILE);
            self.inventory.persist_source(source.as_str(), &path)?;
            self.manager.stage_file(&RepoId::Source(source), SOURCE_INVENTORY_FILE)?;
        }
        self.inventory.persist(&self.path().join(INVENTORY_FILE))?;
        self.manager.stage_file(&RepoId::Main, INVENTORY_FILE)?;

        let message = CommitMessage::by(message, &self.config.cruncher);
        Ok(self.manager.commit(&message)?)
    }

    /// Validate and store one table, creating its source from `source_meta`
    /// if it is not registered yet. Returns the table ID.
    pub fn commit_table(
        &mut self,
        table: DataTable,
        message: &str,
        source_meta: Option<SourceRecord>,
    ) -> StoreResult<String> {
        self.mutate(|store| {
            let (source, id, table) = store.prepare(table)?;
            if store.resolve_source(&source, source_meta.as_ref())? {
                if let Some(record) = source_meta {
                    store.manager.init_new_repository(record)?;
                }
            }
            store.write_table_file(&source, &id, &table)?;
            store.git_commit(message)?;
            info!("committed table {}", id);
            Ok(id)
        })
    }

    /// Store several tables in one commit. Every table is validated before
    /// anything is written; empty tables are skipped.
    pub fn commit_tables(
        &mut self,
        tables: Vec<DataTable>,
        message: &str,
        source_meta: Option<SourceRecord>,
        options: CommitOptions,
    ) -> StoreResult<Vec<String>> {
        self.mutate(|store| {
            let mut prepared = Vec::with_capacity(tables.len());
            let mut new_source = false;
            for table in tables {
                let table = if options.clean_tables {
                    table.cleaned(&store.spatial)
                } else {
                    table
                };
                if table.is_all_missing() {
                    warn!(
                        "skipping empty table {}",
                        table.meta.generate_id().unwrap_or_default()
                    );
                    continue;
                }
                let (source, id, table) = store.prepare(table)?;
                new_source |= store.resolve_source(&source, source_meta.as_ref())?;
                prepared.push((source, id, table));
            }

            let mut to_write = Vec::with_capacity(prepared.len());
            for (source, id, table) in prepared {
                let table = if !store.inventory.contains(&id) || options.update {
                    table
                } else if options.overwrite {
                    table.combine_first(&store.read_stored(&id)?)
                } else if options.append {
                    let mut merged = store.read_stored(&id)?.combine_first(&table);
                    merged.meta = table.meta;
                    merged
                } else {
                    warn!("{} already exists, skipping", id);
                    continue;
                };
                to_write.push((source, id, table));
            }

            if to_write.is_empty() {
                info!("no tables to commit");
                return Ok(Vec::new());
            }
            if let (true, Some(record)) = (new_source, source_meta) {
                store.manager.init_new_repository(record)?;
            }

            let mut ids = Vec::with_capacity(to_write.len());
            for (source, id, table) in to_write {
                store.write_table_file(&source, &id, &table)?;
                ids.push(id);
            }
            store.git_commit(message)?;
            info!("committed {} tables", ids.len());
            Ok(ids)
        })
    }

    fn read_stored(&self, id: &str) -> StoreResult<DataTable> {
        Ok(read_table(&self.table_path(id))?)
    }

    /// Replace table `old_id` by `table`. If the new ID differs, the old
    /// table is removed in the same commit.
    pub fn update_table(&mut self, old_id: &str, table: DataTable, message: &str) -> StoreResult<String> {
        self.mutate(|store| {
            if !store.inventory.contains(old_id) {
                return Err(StoreError::TableNotFound(old_id.to_string()));
            }
            let (source, id, table) = store.prepare(table)?;
            store.resolve_source(&source, None)?;

            store.write_table_file(&source, &id, &table)?;
            if id != old_id {
                store.stage_table_removal(old_id)?;
            }
            store.git_commit(message)?;
            info!("updated table {} -> {}", old_id, id);
            Ok(id)
        })
    }

    /// Pairwise `update_table` in one commit. Old IDs not in the inventory
    /// are ignored and their tables added as new.
    pub fn update_tables<S: AsRef<str>>(
        &mut self,
        old_ids: &[S],
        tables: Vec<DataTable>,
        message: &str,
    ) -> StoreResult<Vec<String>> {
        self.mutate(|store| {
            if old_ids.len() != tables.len() {
                return Err(StoreError::LengthMismatch {
                    ids: old_ids.len(),
                    tables: tables.len(),
                });
            }

            let mut prepared = Vec::with_capacity(tables.len());
            for (old_id, table) in old_ids.iter().zip(tables) {
                let (source, id, table) = store.prepare(table)?;
                store.resolve_source(&source, None)?;
                prepared.push((old_id.as_ref(), source, id, table));
            }

            let mut ids = Vec::with_capacity(prepared.len());
            for (old_id, source, id, table) in prepared {
                store.write_table_file(&source, &id, &table)?;
                if id != old_id && store.inventory.contains(old_id) {
                    store.stage_table_removal(old_id)?;
                }
                ids.push(id);
            }
            store.git_commit(message)?;
            info!("updated {} tables", ids.len());
            Ok(ids)
        })
    }

    /// Remove a table and its inventory row.
    pub fn remove_table(&mut self, id: &str) -> StoreResult<()> {
        self.mutate(|store| {
            if !store.inventory.contains(id) {
                return Err(StoreError::TableNotFound(id.to_string()));
            }
            store.stage_table_removal(id)?;
            store.git_commit(CommitMessage::table_removed())?;
            info!("removed table {}", id);
            Ok(())
        })
    }

    /// Remove several tables in one commit; nothing is removed if any of
    /// them is unknown.
    pub fn remove_tables<S: AsRef<str>>(&mut self, ids: &[S]) -> StoreResult<()> {
        self.mutate(|store| {
            if let Some(missing) = ids
                .iter()
                .map(|id| id.as_ref())
                .find(|id| !store.inventory.contains(id))
            {
                return Err(StoreError::TableNotFound(missing.to_string()));
            }
            let mut unique: Vec<&str> = Vec::with_capacity(ids.len());
            for id in ids.iter().map(|id| id.as_ref()) {
                if !unique.contains(&id) {
                    unique.push(id);
                }
            }
            if unique.is_empty() {
                return Ok(());
            }
            for id in &unique {
                store.stage_table_removal(id)?;
            }
            store.git_commit(CommitMessage::tables_removed())?;
            info!("removed {} tables", unique.len());
            Ok(())
        })
    }

    /// Read a table. IDs missing from the inventory are looked up in the
    /// local data directory before giving up.
    pub fn get_table(&self, id: &str) -> StoreResult<DataTable> {
        if self.inventory.contains(id) {
            return self.read_stored(id);
        }

        let local = self.config.local_data_dir.join(table_file_name(id));
        if local.is_file() {
            debug!("reading {} from {}", id, local.display());
            return Ok(read_table(&local)?);
        }
        Err(StoreError::TableNotFound(id.to_string()))
    }

    /// Read several tables, recording each ID with `logger` if given.
    pub fn get_tables<S: AsRef<str>>(
        &self,
        ids: &[S],
        logger: Option<&TableAccessLogger>,
    ) -> StoreResult<TableSet> {
        let mut set = TableSet::new();
        for id in ids {
            let id = id.as_ref();
            let table = self.get_table(id)?;
            if let Some(logger) = logger {
                logger.record(id);
            }
            set.insert(id, table);
        }
        Ok(set)
    }

    /// Substring search over inventory fields.
    pub fn find(&self, filters: &[FieldFilter]) -> StoreResult<QueryResultView> {
        Ok(self.inventory.find(filters)?)
    }

    /// Shell-pattern (or regex) search over inventory fields.
    pub fn find_pattern(
        &self,
        filters: &[FieldFilter],
        use_regex: bool,
        level: Option<usize>,
    ) -> StoreResult<QueryResultView> {
        Ok(self.inventory.find_pattern(filters, use_regex, level)?)
    }

    pub fn find_exact(&self, filters: &[FieldFilter]) -> StoreResult<QueryResultView> {
        Ok(self.inventory.find_exact(filters)?)
    }

    /// Delete a source with its repository and every table it holds.
    pub fn remove_source(&mut self, id: &str) -> StoreResult<SourceRecord> {
        self.mutate(|store| {
            let source = SourceId::new(id)?;
            let record = store.manager.remove_source(&source)?;
            let removed = store.inventory.remove_source(id);
            store.git_commit(&CommitMessage::source_deleted(id))?;
            info!("removed source {} with {} tables", id, removed.len());
            Ok(record)
        })
    }

    /// Clone a source from the configured remote and add its tables to the
    /// inventory.
    pub fn import_source_from_remote(&mut self, id: &str) -> StoreResult<SourceRecord> {
        self.mutate(|store| {
            let source = SourceId::new(id)?;
            let url = store.config.remote_url_for(id)?;
            let record = store.manager.clone_source(&source, &url)?;
            store.merge_source_inventory(&source)?;
            store.git_commit(&CommitMessage::source_imported(id))?;
            Ok(record)
        })
    }

    /// Push a source repository to the configured remote.
    pub fn export_source_to_remote(&self, id: &str) -> StoreResult<()> {
        let source = SourceId::new(id)?;
        let url = self.config.remote_url_for(id)?;
        self.manager.push_source(&source, &url)?;
        info!("exported {} to {}", id, url);
        Ok(())
    }

    /// Pull a source from its remote. Returns false if it was up to date.
    pub fn update_source_from_remote(&mut self, id: &str) -> StoreResult<bool> {
        self.mutate(|store| {
            let source = SourceId::new(id)?;
            if !store.manager.pull_source(&source)? {
                info!("{} is up to date", id);
                return Ok(false);
            }
            store.inventory.remove_source(id);
            store.merge_source_inventory(&source)?;
            store.git_commit(CommitMessage::source_updated())?;
            Ok(true)
        })
    }

    fn merge_source_inventory(&mut self, source: &SourceId) -> StoreResult<()> {
        let path = self.manager.source_path(source).join(SOURCE_INVENTORY_FILE);
        if path.is_file() {
            self.inventory.merge(read_rows(&path)?);
        } else {
            warn!("{} has no {}", source, SOURCE_INVENTORY_FILE);
        }
        Ok(())
    }

    /// Write tables into `folder`, one file each. Returns the written paths.
    pub fn save_tables_to_disk<S: AsRef<str>>(&self, folder: &Path, ids: &[S]) -> StoreResult<Vec<PathBuf>> {
        fs::create_dir_all(folder)?;
        let mut paths = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let path = folder.join(table_file_name(id));
            write_table(&self.get_table(id)?, &path)?;
            paths.push(path);
        }
        Ok(paths)
    }

    /// Write every table recorded by `logger` into `folder`.
    pub fn save_logged_tables(&self, logger: &TableAccessLogger, folder: &Path) -> StoreResult<Vec<PathBuf>> {
        let ids = logger.snapshot();
        self.save_tables_to_disk(folder, ids.as_slice())
    }

    /// Where a table ID resolves to.
    pub fn validate_id(&self, id: &str) -> IdReport {
        IdReport {
            id: id.to_string(),
            source_registered: self.manager.source_exists(source_of_id(id)),
            in_inventory: self.inventory.contains(id),
            file_exists: self.table_path(id).is_file(),
        }
    }

    /// Inventory rows whose table file is gone.
    pub fn tables_missing_on_disk(&self) -> Vec<String> {
        self.inventory
            .ids()
            .filter(|id| !self.table_path(id).is_file())
            .map(str::to_string)
            .collect()
    }

    /// Commits of `main` or of a source repository, newest first.
    pub fn history(&self, repo: &str, limit: Option<usize>) -> StoreResult<Vec<CommitInfo>> {
        let repo = RepoId::parse(repo)?;
        Ok(self.manager.history(&repo, limit)?)
    }

    pub fn info(&self) -> StoreResult<StoreInfo> {
        Ok(StoreInfo {
            path: self.path().to_path_buf(),
            sources: self.manager.sources().len(),
            tables: self.inventory.len(),
            commits: self.manager.history(&RepoId::Main, None)?.len(),
            read_only: self.config.read_only,
        })
    }
}

/// Store summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub path: PathBuf,
    pub sources: usize,
    pub tables: usize,
    /// Commits on the main repository.
    pub commits: usize,
    pub read_only: bool,
}

impl fmt::Display for StoreInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:      {}", self.path.display())?;
        writeln!(f, "sources:   {}", self.sources)?;
        writeln!(f, "tables:    {}", self.tables)?;
        write!(f, "commits:   {}", self.commits)?;
        if self.read_only {
            write!(f, "\nread-only")?;
        }
        Ok(())
    }
}

/// Result of [`Store::validate_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReport {
    pub id: String,
    pub source_registered: bool,
    pub in_inventory: bool,
    pub file_exists: bool,
}

impl IdReport {
    pub fn is_valid(&self) -> bool {
        self.source_registered && self.in_inventory && self.file_exists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::INVENTORY_HEADER;
    use crate::table::{Cell, TableMeta};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("shelf"))
            .cruncher("tester")
            .local_data_dir(dir.path().join("local"));
        let store = Store::open_with_config(config).unwrap();
        (dir, store)
    }

    fn meta(entity: &str, scenario: &str, source: &str) -> TableMeta {
        TableMeta::from_pairs([
            ("entity", entity),
            ("scenario", scenario),
            ("source", source),
            ("unit", "Mt"),
        ])
    }

    fn table(entity: &str, source: &str, rows: &[(&str, [Option<f64>; 2])]) -> DataTable {
        DataTable::new(
            rows.iter().map(|(r, _)| r.to_string()).collect(),
            vec![2020, 2030],
            rows.iter().map(|(_, v)| v.to_vec()).collect(),
            meta(entity, "Historic", source),
        )
        .unwrap()
    }

    fn record(id: &str) -> SourceRecord {
        SourceRecord::new(SourceId::new(id).unwrap()).with_licence("CC-BY-4.0")
    }

    fn commit_sample(store: &mut Store) -> String {
        let t = table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), Some(2.0)]), ("DEU", [Some(3.0), None])]);
        store.commit_table(t, "add CO2", Some(record("SRC_2020"))).unwrap()
    }

    #[test]
    fn test_open_bootstraps_store() {
        let (dir, store) = setup();
        let root = dir.path().join("shelf");
        assert!(layout::is_initialized(&root));
        assert!(store.sources().is_empty());
        assert!(store.inventory().is_empty());
        assert_eq!(store.info().unwrap().commits, 1);
        assert!(store.spatial_ids().contains("ZAF"));
    }

    #[test]
    fn test_open_read_only_requires_store() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("missing")).read_only(true);
        assert!(matches!(
            Store::open_with_config(config),
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_commit_table_new_source() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);
        assert_eq!(id, "CO2__Historic__SRC_2020");

        let source = dir.path().join("shelf/database/SRC_2020");
        assert!(source.join("tables/CO2__Historic__SRC_2020.csv").is_file());
        assert!(source.join("source_inventory.csv").is_file());
        assert!(source.join("meta.csv").is_file());

        let head = store.history("SRC_2020", Some(1)).unwrap();
        assert_eq!(head[0].summary(), "add CO2 by tester");
        assert_eq!(
            store.sources().get("SRC_2020").unwrap().git_commit_hash,
            Some(head[0].id.to_hex())
        );
        assert_eq!(store.history("main", None).unwrap().len(), 2);

        let stored = store.get_table(&id).unwrap();
        assert_eq!(stored.regions(), ["DEU", "ZAF"]);
        assert_eq!(stored.meta.get(CREATOR_KEY), Some("tester"));
        assert_eq!(stored.value("ZAF", 2030), Some(2.0));
    }

    #[test]
    fn test_commit_table_unknown_source() {
        let (dir, mut store) = setup();
        let t = table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None])]);
        assert!(matches!(
            store.commit_table(t, "add", None),
            Err(StoreError::UnknownSource(_))
        ));
        assert!(!dir.path().join("shelf/database/SRC_2020").exists());
    }

    #[test]
    fn test_commit_table_source_mismatch() {
        let (_dir, mut store) = setup();
        let t = table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None])]);
        assert!(matches!(
            store.commit_table(t, "add", Some(record("OTHER_2020"))),
            Err(StoreError::SourceMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_table_leaves_store_untouched() {
        let (dir, mut store) = setup();
        let root = dir.path().join("shelf");
        let inventory = fs::read(root.join("inventory.csv")).unwrap();
        let sources = fs::read(root.join("sources.csv")).unwrap();

        let t = table("CO2", "SRC_2020", &[("XXX", [Some(1.0), None])]);
        let err = store.commit_table(t, "add", Some(record("SRC_2020"))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTable { .. }));
        assert_eq!(err.exit_code(), 1);

        assert_eq!(fs::read(root.join("inventory.csv")).unwrap(), inventory);
        assert_eq!(fs::read(root.join("sources.csv")).unwrap(), sources);
        assert!(!root.join("database/SRC_2020").exists());
        assert_eq!(store.info().unwrap().commits, 1);
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let (_dir, mut store) = setup();
        let t = DataTable::from_cells(
            vec!["ZAF".into()],
            vec!["2020".into()],
            vec![vec![Cell::Text("n/a".into())]],
            meta("CO2", "Historic", "SRC_2020"),
        )
        .unwrap();
        assert!(matches!(
            store.commit_table(t, "add", Some(record("SRC_2020"))),
            Err(StoreError::InvalidTable { .. })
        ));
    }

    #[test]
    fn test_recommit_same_id_is_one_commit() {
        let (_dir, mut store) = setup();
        let id = commit_sample(&mut store);
        let before = store.history("SRC_2020", None).unwrap().len();

        let mut changed = store.get_table(&id).unwrap();
        changed.set_value("ZAF", 2020, Some(10.0));
        store.commit_table(changed, "fix ZAF", None).unwrap();

        assert_eq!(store.history("SRC_2020", None).unwrap().len(), before + 1);
        assert_eq!(store.inventory().len(), 1);
        assert_eq!(store.get_table(&id).unwrap().value("ZAF", 2020), Some(10.0));
    }

    #[test]
    fn test_commit_tables_cleans_and_skips_empty() {
        let (_dir, mut store) = setup();
        let tables = vec![
            table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None]), ("XXX", [Some(5.0), None])]),
            table("CH4", "SRC_2020", &[("ZAF", [None, None])]),
        ];
        let ids = store
            .commit_tables(tables, "batch", Some(record("SRC_2020")), CommitOptions::default())
            .unwrap();
        assert_eq!(ids, vec!["CO2__Historic__SRC_2020"]);

        let stored = store.get_table(&ids[0]).unwrap();
        assert_eq!(stored.regions(), ["ZAF"]);
        assert_eq!(stored.columns(), ["2020"]);
    }

    #[test]
    fn test_commit_tables_without_clean_validates_all_first() {
        let (dir, mut store) = setup();
        let tables = vec![
            table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None])]),
            table("CH4", "SRC_2020", &[("XXX", [Some(1.0), None])]),
        ];
        let options = CommitOptions::default().clean_tables(false);
        assert!(store
            .commit_tables(tables, "batch", Some(record("SRC_2020")), options)
            .is_err());
        assert!(!dir.path().join("shelf/database/SRC_2020").exists());
        assert!(store.inventory().is_empty());
    }

    #[test]
    fn test_commit_tables_merge_modes() {
        let (_dir, mut store) = setup();
        let id = commit_sample(&mut store);
        let incoming = || table("CO2", "SRC_2020", &[("ZAF", [Some(9.0), Some(9.0)]), ("USA", [Some(4.0), None])]);

        // existing IDs are skipped without a mode
        let ids = store
            .commit_tables(vec![incoming()], "again", None, CommitOptions::default())
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(store.get_table(&id).unwrap().value("ZAF", 2020), Some(1.0));

        store
            .commit_tables(vec![incoming()], "append", None, CommitOptions::default().append(true))
            .unwrap();
        let appended = store.get_table(&id).unwrap();
        assert_eq!(appended.value("ZAF", 2020), Some(1.0));
        assert_eq!(appended.value("DEU", 2020), Some(3.0));
        assert_eq!(appended.value("USA", 2020), Some(4.0));

        store
            .commit_tables(vec![incoming()], "overwrite", None, CommitOptions::default().overwrite(true))
            .unwrap();
        let overwritten = store.get_table(&id).unwrap();
        assert_eq!(overwritten.value("ZAF", 2020), Some(9.0));
        assert_eq!(overwritten.value("DEU", 2020), Some(3.0));

        store
            .commit_tables(vec![incoming()], "update", None, CommitOptions::default().update(true))
            .unwrap();
        let updated = store.get_table(&id).unwrap();
        assert_eq!(updated.regions(), ["USA", "ZAF"]);
    }

    #[test]
    fn test_update_table_changed_id() {
        let (dir, mut store) = setup();
        let old = commit_sample(&mut store);
        let before = store.history("SRC_2020", None).unwrap().len();

        let mut t = store.get_table(&old).unwrap();
        t.meta.set("scenario", "SSP2");
        let new = store.update_table(&old, t, "rename").unwrap();
        assert_eq!(new, "CO2__SSP2__SRC_2020");

        assert!(!store.table_exists(&old));
        assert!(store.table_exists(&new));
        assert!(!dir.path().join("shelf/database/SRC_2020/tables/CO2__Historic__SRC_2020.csv").exists());
        assert_eq!(store.history("SRC_2020", None).unwrap().len(), before + 1);
    }

    #[test]
    fn test_update_table_unknown_old_id() {
        let (_dir, mut store) = setup();
        commit_sample(&mut store);
        let t = table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None])]);
        assert!(matches!(
            store.update_table("NOPE__X__SRC_2020", t, "x"),
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_update_tables_length_mismatch() {
        let (_dir, mut store) = setup();
        let t = table("CO2", "SRC_2020", &[("ZAF", [Some(1.0), None])]);
        assert!(matches!(
            store.update_tables::<&str>(&[], vec![t], "x"),
            Err(StoreError::LengthMismatch { ids: 0, tables: 1 })
        ));
    }

    #[test]
    fn test_remove_table() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);
        store.remove_table(&id).unwrap();

        assert!(store.inventory().is_empty());
        assert!(!store.table_path(&id).exists());
        let head = store.history("main", Some(1)).unwrap();
        assert_eq!(head[0].summary(), "Table removed by tester");

        let inventory = fs::read_to_string(dir.path().join("shelf/inventory.csv")).unwrap();
        assert_eq!(inventory.trim(), INVENTORY_HEADER.join(","));
    }

    #[test]
    fn test_remove_missing_table_changes_nothing() {
        let (dir, mut store) = setup();
        commit_sample(&mut store);
        let root = dir.path().join("shelf");
        let inventory = fs::read(root.join("inventory.csv")).unwrap();
        let sources = fs::read(root.join("sources.csv")).unwrap();

        let err = store.remove_table("CH4__Historic__SRC_2020").unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(_)));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(fs::read(root.join("inventory.csv")).unwrap(), inventory);
        assert_eq!(fs::read(root.join("sources.csv")).unwrap(), sources);
    }

    #[test]
    fn test_remove_tables_all_or_nothing() {
        let (_dir, mut store) = setup();
        let first = commit_sample(&mut store);
        let second = store
            .commit_table(table("CH4", "SRC_2020", &[("ZAF", [Some(1.0), None])]), "add", None)
            .unwrap();

        assert!(store.remove_tables(&[first.as_str(), "NOPE__X__SRC_2020"]).is_err());
        assert_eq!(store.inventory().len(), 2);

        store.remove_tables(&[first, second]).unwrap();
        assert!(store.inventory().is_empty());
        let head = store.history("SRC_2020", Some(1)).unwrap();
        assert_eq!(head[0].summary(), "Tables removed by tester");
    }

    #[test]
    fn test_remove_tables_with_repeated_id() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);

        store.remove_tables(&[id.as_str(), id.as_str()]).unwrap();
        assert!(store.inventory().is_empty());
        assert!(!store.table_path(&id).exists());
        drop(store);

        let reopened = Store::open(dir.path().join("shelf")).unwrap();
        assert!(!reopened.table_exists(&id));
    }

    #[test]
    fn test_remove_source() {
        let (dir, mut store) = setup();
        commit_sample(&mut store);
        store.remove_source("SRC_2020").unwrap();

        assert!(!store.source_exists("SRC_2020"));
        assert!(store.inventory().is_empty());
        assert!(!dir.path().join("shelf/database/SRC_2020").exists());
        let head = store.history("main", Some(1)).unwrap();
        assert_eq!(head[0].summary(), "SRC_2020 deleted by tester");

        assert!(matches!(
            store.remove_source("SRC_2020"),
            Err(StoreError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_get_table_local_fallback() {
        let (dir, store) = setup();
        let t = table("CO2", "LOCAL_2021", &[("ZAF", [Some(1.0), None])]);
        let id = "CO2__Historic__LOCAL_2021";
        write_table(&t, &dir.path().join("local").join(table_file_name(id))).unwrap();

        assert!(!store.table_exists(id));
        assert_eq!(store.get_table(id).unwrap().value("ZAF", 2020), Some(1.0));
        assert!(matches!(
            store.get_table("NOPE__X__Y"),
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_logged_tables_saved_to_disk() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);
        let logger = TableAccessLogger::new();
        logger.start();

        let set = store.get_tables(&[id.as_str()], Some(&logger)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(logger.snapshot(), vec![id.clone()]);

        let out = dir.path().join("export");
        let paths = store.save_logged_tables(&logger, &out).unwrap();
        assert_eq!(paths, vec![out.join("CO2__Historic__SRC_2020.csv")]);
        assert_eq!(read_table(&paths[0]).unwrap(), store.get_table(&id).unwrap());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);
        drop(store);

        let config = StoreConfig::new(dir.path().join("shelf")).read_only(true);
        let mut store = Store::open_with_config(config).unwrap();
        assert!(store.get_table(&id).is_ok());
        assert!(matches!(store.remove_table(&id), Err(StoreError::ReadOnly(_))));
        assert!(matches!(
            store.remove_table("NOPE__X__Y"),
            Err(StoreError::ReadOnly(_))
        ));
        assert!(store.table_exists(&id));
    }

    #[test]
    fn test_find_and_validate_id() {
        let (_dir, mut store) = setup();
        let id = commit_sample(&mut store);

        let found = store.find(&["entity=CO".parse().unwrap()]).unwrap();
        assert_eq!(found.ids(), vec![id.as_str()]);
        let found = store
            .find_pattern(&["source=SRC_*".parse().unwrap()], false, None)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.find_exact(&["entity=CO".parse().unwrap()]).unwrap().is_empty());
        assert!(store.find(&["colour=red".parse().unwrap()]).is_err());

        assert!(store.validate_id(&id).is_valid());
        let report = store.validate_id("CO2__Historic__NOPE_2020");
        assert!(!report.source_registered && !report.in_inventory);

        fs::remove_file(store.table_path(&id)).unwrap();
        assert_eq!(store.tables_missing_on_disk(), vec![id.clone()]);
        assert!(!store.validate_id(&id).file_exists);
    }

    #[test]
    fn test_reopen_after_commits() {
        let (dir, mut store) = setup();
        let id = commit_sample(&mut store);
        store.remove_table(&id).unwrap();
        commit_sample(&mut store);
        drop(store);

        let store = Store::open(dir.path().join("shelf")).unwrap();
        assert_eq!(store.inventory().len(), 1);
        assert_eq!(store.sources().len(), 1);
    }

    #[test]
    fn test_sandbox() {
        let (_dir, store) = Store::sandbox().unwrap();
        for id in SANDBOX_SOURCES {
            assert!(store.source_exists(id));
        }
        assert_eq!(store.inventory().len(), 4);
        assert_eq!(store.info().unwrap().commits, 3);
        let found = store
            .find_exact(&["scenario=Projection".parse().unwrap()])
            .unwrap();
        assert_eq!(found.len(), 2);
        let found = store
            .find_pattern(&["source=SOURCE_B*".parse().unwrap()], false, None)
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
