//! Coordination of the per-source repositories and the main repository.
//!
//! The manager owns every repository handle of a store together with the
//! `sources.csv` catalog, and turns a set of staged changes spread over several
//! repositories into one logical commit:
//!
//! 1. every pending source repository is committed, in the order it was first
//!    staged, and its new head is recorded in the in-memory catalog
//! 2. `sources.csv` is written and staged on the main repository
//! 3. the main repository is committed last
//!
//! There is no rollback across repositories. If step 1 fails halfway, the
//! sources committed so far keep their commits while `sources.csv` on disk
//! still holds the old hashes, and the next [`RepositoryManager::open`] fails
//! with [`CatalogError::HashMismatch`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::sources::{SourceCatalog, SourceRecord};
use crate::catalog::types::{RepoId, SourceId};
use crate::storage::{
    CommitId, CommitInfo, GitRepository, GitSignature, StorageError, VersionControl,
};

/// Source catalog file, relative to the store root.
pub const SOURCES_FILE: &str = "sources.csv";
/// Directory holding one repository per source.
pub const DATABASE_DIR: &str = "database";
/// Per-source metadata file.
pub const SOURCE_META_FILE: &str = "meta.csv";
/// Folder of a source repository holding its table files.
pub const TABLES_DIR: &str = "tables";
/// Fixed subfolders of every source repository.
pub const SOURCE_SUBFOLDERS: [&str; 2] = [TABLES_DIR, "raw_data"];

const KEEP_FILE: &str = ".gitkeep";

/// One staged change, recorded until the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    Add(PathBuf),
    Remove(PathBuf),
}

impl StagedChange {
    pub fn path(&self) -> &Path {
        match self {
            StagedChange::Add(p) | StagedChange::Remove(p) => p,
        }
    }
}

/// Owns the repositories of one store.
pub struct RepositoryManager<R: VersionControl = GitRepository> {
    root: PathBuf,
    sources: SourceCatalog,
    main: R,
    handles: HashMap<SourceId, R>,
    /// repositories with staged changes, in first-staged order
    pending: Vec<RepoId>,
    staged: HashMap<RepoId, Vec<StagedChange>>,
    /// sources registered since the last commit
    created: Vec<SourceId>,
    author: GitSignature,
}

impl<R: VersionControl> RepositoryManager<R> {
    /// Open every repository listed in `sources.csv` and check it against
    /// the catalog.
    pub fn open(root: &Path, author: GitSignature) -> CatalogResult<Self> {
        let sources = SourceCatalog::load(&root.join(SOURCES_FILE))?;

        let mut handles = HashMap::new();
        for id in sources.ids() {
            let handle = R::open(&root.join(DATABASE_DIR).join(id.as_str()))?;
            handles.insert(id.clone(), handle);
        }
        let main = R::open(root)?;

        let manager = Self {
            root: root.to_path_buf(),
            sources,
            main,
            handles,
            pending: Vec::new(),
            staged: HashMap::new(),
            created: Vec::new(),
            author,
        };

        for id in manager.sources.ids() {
            manager.validate(&RepoId::Source(id.clone()))?;
            manager.verify_git_hash(id)?;
        }
        manager.validate(&RepoId::Main)?;

        debug!(
            "opened {} with {} sources",
            root.display(),
            manager.sources.len()
        );
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sources(&self) -> &SourceCatalog {
        &self.sources
    }

    pub fn author(&self) -> &GitSignature {
        &self.author
    }

    pub fn source_exists(&self, id: &str) -> bool {
        self.sources.contains(id)
    }

    /// Working directory of a source repository.
    pub fn source_path(&self, id: &SourceId) -> PathBuf {
        self.root.join(DATABASE_DIR).join(id.as_str())
    }

    pub fn sources_file(&self) -> PathBuf {
        self.root.join(SOURCES_FILE)
    }

    /// Handle of a repository.
    pub fn handle(&self, repo: &RepoId) -> CatalogResult<&R> {
        match repo {
            RepoId::Main => Ok(&self.main),
            RepoId::Source(id) => self
                .handles
                .get(id)
                .ok_or_else(|| CatalogError::UnknownSource(id.to_string())),
        }
    }

    /// Fail with `InconsistentRepository` if the repository is dirty.
    pub fn validate(&self, repo: &RepoId) -> CatalogResult<()> {
        let handle = self.handle(repo)?;
        if handle.is_dirty()? {
            return Err(CatalogError::InconsistentRepository {
                repo: repo.to_string(),
                path: handle.path().to_path_buf(),
            });
        }
        Ok(())
    }

    /// Fail with `HashMismatch` unless the repository head is the commit
    /// recorded in the catalog. A repository without commits matches an
    /// empty catalog entry.
    pub fn verify_git_hash(&self, id: &SourceId) -> CatalogResult<()> {
        let record = self
            .sources
            .get(id.as_str())
            .ok_or_else(|| CatalogError::UnknownSource(id.to_string()))?;
        let actual = head_hex(self.handle(&RepoId::Source(id.clone()))?)?;

        if actual != record.git_commit_hash {
            return Err(CatalogError::HashMismatch {
                source_id: id.to_string(),
                recorded: record.git_commit_hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn mark_pending(&mut self, repo: &RepoId, change: StagedChange) -> CatalogResult<()> {
        self.handle(repo)?;
        let changes = self.staged.entry(repo.clone()).or_default();
        if !changes.contains(&change) {
            changes.push(change);
        }
        if !self.pending.contains(repo) {
            self.pending.push(repo.clone());
        }
        Ok(())
    }

    /// Record a file to be added in the next commit. `path` is relative to
    /// the repository's working directory.
    pub fn stage_file(&mut self, repo: &RepoId, path: impl Into<PathBuf>) -> CatalogResult<()> {
        self.mark_pending(repo, StagedChange::Add(path.into()))
    }

    /// Record a tracked file to be deleted in the next commit.
    pub fn stage_removal(&mut self, repo: &RepoId, path: impl Into<PathBuf>) -> CatalogResult<()> {
        self.mark_pending(repo, StagedChange::Remove(path.into()))
    }

    /// Repositories with staged changes, in commit order (main excluded).
    pub fn pending_sources(&self) -> impl Iterator<Item = &SourceId> {
        self.pending.iter().filter_map(RepoId::as_source)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.created.is_empty()
    }

    pub fn staged_changes(&self, repo: &RepoId) -> &[StagedChange] {
        self.staged.get(repo).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register a new source and lay out its repository, staging everything
    /// for the next commit.
    pub fn init_new_repository(&mut self, record: SourceRecord) -> CatalogResult<()> {
        let id = record.source_id.clone();
        if self.sources.contains(id.as_str()) {
            return Err(CatalogError::SourceExists(id.to_string()));
        }

        let path = self.source_path(&id);
        for folder in SOURCE_SUBFOLDERS {
            fs::create_dir_all(path.join(folder))?;
            fs::write(path.join(folder).join(KEEP_FILE), "")?;
        }
        let handle = R::init(&path)?;
        record.write_meta_file(&path.join(SOURCE_META_FILE))?;

        self.sources.insert(record)?;
        self.sources.persist(&self.sources_file())?;
        self.handles.insert(id.clone(), handle);
        self.created.push(id.clone());

        let repo = RepoId::Source(id.clone());
        self.stage_file(&RepoId::Main, SOURCES_FILE)?;
        self.stage_file(&repo, SOURCE_META_FILE)?;
        for folder in SOURCE_SUBFOLDERS {
            self.stage_file(&repo, Path::new(folder).join(KEEP_FILE))?;
        }

        info!("added new source {}", id);
        Ok(())
    }

    fn apply_staged(&self, repo: &RepoId) -> CatalogResult<()> {
        let handle = self.handle(repo)?;
        for change in self.staged_changes(repo) {
            match change {
                StagedChange::Add(path) => handle.stage_file(path)?,
                StagedChange::Remove(path) => handle.stage_removal(path)?,
            }
        }
        Ok(())
    }

    /// Commit every pending repository, sources first and main last.
    pub fn commit(&mut self, message: &str) -> CatalogResult<CommitId> {
        let order: Vec<SourceId> = self.pending_sources().cloned().collect();

        for id in order {
            let repo = RepoId::Source(id.clone());
            self.apply_staged(&repo)?;
            let hash = self.handle(&repo)?.commit(message, &self.author)?;
            self.sources.set_hash(&id, Some(hash.to_hex()))?;
            self.staged.remove(&repo);
            self.pending.retain(|r| r != &repo);
            self.created.retain(|c| c != &id);
            debug!("committed source {} at {}", id, hash.short());
        }

        self.sources.persist(&self.sources_file())?;
        self.stage_file(&RepoId::Main, SOURCES_FILE)?;
        self.apply_staged(&RepoId::Main)?;
        let head = self.main.commit(message, &self.author)?;

        self.staged.clear();
        self.pending.clear();
        self.created.clear();
        info!("committed {}: {}", head.short(), message);
        Ok(head)
    }

    /// Undo everything since the last commit. Staged files go back to their
    /// committed state, sources registered since then are deleted, and the
    /// catalog is reloaded from disk.
    ///
    /// Source repositories that already committed are left alone, so after a
    /// commit that failed halfway the next open still reports their hashes.
    pub fn rollback(&mut self) {
        if !self.has_pending() {
            return;
        }
        warn!("rolling back staged changes for {} repositories", self.pending.len());

        let created = std::mem::take(&mut self.created);
        for id in &created {
            self.handles.remove(id);
            let repo = RepoId::Source(id.clone());
            self.pending.retain(|r| r != &repo);
            self.staged.remove(&repo);

            let path = self.source_path(id);
            if path.exists() {
                if let Err(e) = fs::remove_dir_all(&path) {
                    warn!("could not delete {}: {}", path.display(), e);
                }
            }
        }

        let mut pending = std::mem::take(&mut self.pending);
        // main last, after every source it refers to
        pending.sort_by_key(RepoId::is_main);
        for repo in pending {
            let changes = self.staged.remove(&repo).unwrap_or_default();
            let handle = match self.handle(&repo) {
                Ok(handle) => handle,
                Err(_) => continue,
            };
            for change in changes {
                if let Err(e) = handle.restore_file(change.path()) {
                    warn!("could not restore {} in {}: {}", change.path().display(), repo, e);
                }
            }
        }
        self.staged.clear();

        match SourceCatalog::load(&self.sources_file()) {
            Ok(mut sources) => {
                let mut dropped = false;
                for id in &created {
                    dropped |= sources.remove(id).is_some();
                }
                if dropped {
                    if let Err(e) = sources.persist(&self.sources_file()) {
                        warn!("could not rewrite {}: {}", SOURCES_FILE, e);
                    }
                }
                self.sources = sources;
            }
            Err(e) => warn!("could not reload {}: {}", SOURCES_FILE, e),
        }
    }

    /// Delete a source repository and its catalog row; the main repository
    /// picks up the change on the next commit.
    pub fn remove_source(&mut self, id: &SourceId) -> CatalogResult<SourceRecord> {
        let record = self
            .sources
            .remove(id)
            .ok_or_else(|| CatalogError::UnknownSource(id.to_string()))?;
        self.handles.remove(id);
        self.created.retain(|c| c != id);

        let repo = RepoId::Source(id.clone());
        self.pending.retain(|r| r != &repo);
        self.staged.remove(&repo);

        let path = self.source_path(id);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        self.sources.persist(&self.sources_file())?;
        self.stage_file(&RepoId::Main, SOURCES_FILE)?;

        info!("removed source {}", id);
        Ok(record)
    }

    /// Clone a source repository from `url` and register it from its
    /// `meta.csv`.
    pub fn clone_source(&mut self, id: &SourceId, url: &str) -> CatalogResult<SourceRecord> {
        if self.sources.contains(id.as_str()) {
            return Err(CatalogError::SourceExists(id.to_string()));
        }

        let path = self.source_path(id);
        fs::create_dir_all(self.root.join(DATABASE_DIR))?;
        let handle = R::clone_from(url, &path)?;
        let mut record = SourceRecord::read_meta_file(&path.join(SOURCE_META_FILE))?;
        if &record.source_id != id {
            warn!(
                "meta.csv of {} names source {}, using {}",
                url, record.source_id, id
            );
            record.source_id = id.clone();
        }
        record.git_commit_hash = head_hex(&handle)?;

        self.sources.insert(record.clone())?;
        self.handles.insert(id.clone(), handle);
        self.sources.persist(&self.sources_file())?;
        self.stage_file(&RepoId::Main, SOURCES_FILE)?;
        Ok(record)
    }

    /// Push a source repository, adding `origin` first if needed.
    pub fn push_source(&self, id: &SourceId, url: &str) -> CatalogResult<()> {
        let handle = self.handle(&RepoId::Source(id.clone()))?;
        if handle.ensure_remote(url)? {
            info!("added remote {} for {}", url, id);
        }
        handle.push()?;
        Ok(())
    }

    /// Fast-forward a source repository from its remote. Returns true if the
    /// head moved; the new hash is then staged for the next commit.
    pub fn pull_source(&mut self, id: &SourceId) -> CatalogResult<bool> {
        self.verify_git_hash(id)?;
        let head = self.handle(&RepoId::Source(id.clone()))?.pull()?;
        let hex = Some(head.to_hex());

        let recorded = self.sources.get(id.as_str()).and_then(|r| r.git_commit_hash.clone());
        if recorded == hex {
            return Ok(false);
        }
        self.sources.set_hash(id, hex)?;
        self.sources.persist(&self.sources_file())?;
        self.stage_file(&RepoId::Main, SOURCES_FILE)?;
        Ok(true)
    }

    /// Commits of a repository, newest first.
    pub fn history(&self, repo: &RepoId, limit: Option<usize>) -> CatalogResult<Vec<CommitInfo>> {
        Ok(self.handle(repo)?.history(limit)?)
    }
}

fn head_hex<R: VersionControl>(handle: &R) -> CatalogResult<Option<String>> {
    match handle.head_hash() {
        Ok(id) => Ok(Some(id.to_hex())),
        Err(StorageError::EmptyRepository) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
