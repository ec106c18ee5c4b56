//!   Git working-tree wrapper.
//!
//!  This is the central component of the storage layer. It wraps `git2::Repository`
//!  with lock-protected access and implements [`VersionControl`] for one
//!  source repository or for the umbrella "main" repository.
//!
//! All other storage modules use this for Git access.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ErrorCode, Repository, Status, StatusOptions};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::storage::backend::VersionControl;
use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::progress::{self, TransferProgress};
use crate::storage::types::{CommitId, GitSignature};

/// Name of the remote used by import/export.
pub const ORIGIN: &str = "origin";

/// The main Git repository wrapper.
///
/// Clone this to share the handle - it uses Arc internally.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: RwLock<Repository>,
    path: PathBuf,
    /// paths staged into the index since the last commit
    staged: Mutex<Vec<PathBuf>>,
}

impl GitRepository {
    fn wrap(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: RwLock::new(repo),
                path: path.to_path_buf(),
                staged: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Execute a function with read access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.read();
        f(&repo)
    }

    /// Execute a function with write access to the repository.
    pub fn with_repo_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.write();
        f(&repo)
    }

    /// Turn a caller path (absolute or relative to the working tree) into
    /// the workdir-relative form the index expects.
    fn relative(&self, path: &Path) -> StorageResult<PathBuf> {
        if path.is_relative() {
            return Ok(path.to_path_buf());
        }
        let root = fs::canonicalize(&self.inner.path)?;
        let absolute = match path.parent() {
            Some(parent) if parent.exists() => {
                fs::canonicalize(parent)?.join(path.file_name().unwrap_or_default())
            }
            _ => path.to_path_buf(),
        };
        absolute
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .map_err(|_| StorageError::OutsideWorkdir {
                repo: self.inner.path.clone(),
                path: path.to_path_buf(),
            })
    }

    fn current_branch(repo: &Repository) -> StorageResult<String> {
        let head = repo.head().map_err(unborn_to_empty)?;
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Internal("HEAD is not a branch".to_string()))
    }
}

fn unborn_to_empty(e: git2::Error) -> StorageError {
    if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound {
        StorageError::EmptyRepository
    } else {
        StorageError::Git(e)
    }
}

impl VersionControl for GitRepository {
    fn init(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;
        let repo = Repository::init(path)?;
        debug!("initialized repository at {}", path.display());
        Ok(Self::wrap(repo, path))
    }

    fn open(path: &Path) -> StorageResult<Self> {
        let repo =
            Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        if repo.workdir().is_none() {
            return Err(StorageError::NoWorkdir(path.to_path_buf()));
        }
        Ok(Self::wrap(repo, path))
    }

    fn clone_from(url: &str, path: &Path) -> StorageResult<Self> {
        let mut progress = TransferProgress::new(format!("clone {}", url));
        let repo = RepoBuilder::new()
            .fetch_options(progress::fetch_options(&mut progress))
            .clone(url, path)?;
        info!("cloned {} into {}", url, path.display());
        Ok(Self::wrap(repo, path))
    }

    fn path(&self) -> &Path {
        &self.inner.path
    }

    fn is_dirty(&self) -> StorageResult<bool> {
        self.with_repo(|repo| {
            let mut opts = StatusOptions::new();
            opts.include_untracked(true)
                .recurse_untracked_dirs(false)
                .include_ignored(false)
                .exclude_submodules(true);
            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(statuses
                .iter()
                .any(|entry| entry.status() != Status::CURRENT && !entry.status().is_ignored()))
        })
    }

    fn stage_file(&self, path: &Path) -> StorageResult<()> {
        let rel = self.relative(path)?;
        self.with_repo_mut(|repo| {
            let mut index = repo.index()?;
            index.add_path(&rel)?;
            index.write()?;
            Ok(())
        })?;
        let mut staged = self.inner.staged.lock();
        if !staged.contains(&rel) {
            staged.push(rel);
        }
        Ok(())
    }

    fn stage_removal(&self, path: &Path) -> StorageResult<()> {
        let rel = self.relative(path)?;
        self.with_repo_mut(|repo| {
            let mut index = repo.index()?;
            if index.get_path(&rel, 0).is_none() {
                return Err(StorageError::FileNotTracked {
                    repo: self.inner.path.clone(),
                    path: rel.clone(),
                });
            }
            index.remove_path(&rel)?;
            index.write()?;
            Ok(())
        })?;

        let on_disk = self.inner.path.join(&rel);
        if on_disk.exists() {
            fs::remove_file(&on_disk)?;
        }
        let mut staged = self.inner.staged.lock();
        if !staged.contains(&rel) {
            staged.push(rel);
        }
        Ok(())
    }

    fn restore_file(&self, path: &Path) -> StorageResult<()> {
        let rel = self.relative(path)?;
        let tracked = self.with_repo_mut(|repo| {
            let head = match repo.head() {
                Ok(head) => Some(head.peel_to_commit()?),
                Err(e) => match unborn_to_empty(e) {
                    StorageError::EmptyRepository => None,
                    e => return Err(e),
                },
            };
            let in_head = match &head {
                Some(commit) => commit.tree()?.get_path(&rel).is_ok(),
                None => false,
            };

            if let (true, Some(commit)) = (in_head, &head) {
                repo.reset_default(Some(commit.as_object()), [rel.as_path()])?;
                let mut checkout = CheckoutBuilder::new();
                checkout.force().disable_pathspec_match(true).path(rel.as_path());
                repo.checkout_head(Some(&mut checkout))?;
            } else {
                let mut index = repo.index()?;
                if index.get_path(&rel, 0).is_some() {
                    index.remove_path(&rel)?;
                    index.write()?;
                }
            }
            Ok(in_head)
        })?;

        let on_disk = self.inner.path.join(&rel);
        if !tracked && on_disk.is_file() {
            fs::remove_file(&on_disk)?;
        }
        self.inner.staged.lock().retain(|p| p != &rel);
        debug!("restored {} in {}", rel.display(), self.inner.path.display());
        Ok(())
    }

    fn staged_count(&self) -> usize {
        self.inner.staged.lock().len()
    }

    fn commit(&self, message: &str, author: &GitSignature) -> StorageResult<CommitId> {
        if self.staged_count() == 0 {
            return Err(StorageError::NothingToCommit(self.inner.path.clone()));
        }
        let id = self.with_repo_mut(|repo| {
            CommitBuilder::new(repo)
                .message(message)
                .signature(author.clone())
                .commit()
        })?;
        self.inner.staged.lock().clear();
        debug!("committed {} in {}", id.short(), self.inner.path.display());
        Ok(id)
    }

    fn head_hash(&self) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let head = repo.head().map_err(unborn_to_empty)?;
            let commit = head.peel_to_commit()?;
            Ok(CommitId::new(commit.id()))
        })
    }

    fn history(&self, limit: Option<usize>) -> StorageResult<Vec<CommitInfo>> {
        let head = match self.head_hash() {
            Ok(head) => head,
            Err(StorageError::EmptyRepository) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.with_repo(|repo| {
            let iter = commit::history(repo, head)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }

    fn ensure_remote(&self, url: &str) -> StorageResult<bool> {
        self.with_repo_mut(|repo| {
            if repo.find_remote(ORIGIN).is_ok() {
                return Ok(false);
            }
            repo.remote(ORIGIN, url)?;
            Ok(true)
        })
    }

    fn push(&self) -> StorageResult<()> {
        self.with_repo_mut(|repo| {
            let branch = Self::current_branch(repo)?;
            let mut remote = repo
                .find_remote(ORIGIN)
                .map_err(|_| StorageError::RemoteNotFound(ORIGIN.to_string()))?;
            let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
            let mut progress = TransferProgress::new(format!("push {}", branch));
            remote.push(&[refspec.as_str()], Some(&mut progress::push_options(&mut progress)))?;
            info!("pushed {} of {}", branch, self.inner.path.display());
            Ok(())
        })
    }

    fn pull(&self) -> StorageResult<CommitId> {
        self.with_repo_mut(|repo| {
            let branch = Self::current_branch(repo)?;
            let mut remote = repo
                .find_remote(ORIGIN)
                .map_err(|_| StorageError::RemoteNotFound(ORIGIN.to_string()))?;
            let mut progress = TransferProgress::new(format!("pull {}", branch));
            remote.fetch(
                &[branch.as_str()],
                Some(&mut progress::fetch_options(&mut progress)),
                None,
            )?;

            let fetch_head = repo.find_reference("FETCH_HEAD")?;
            let incoming = repo.reference_to_annotated_commit(&fetch_head)?;
            let (analysis, _) = repo.merge_analysis(&[&incoming])?;

            if analysis.is_up_to_date() {
                debug!("{} is up to date", branch);
            } else if analysis.is_fast_forward() {
                let refname = format!("refs/heads/{}", branch);
                let mut reference = repo.find_reference(&refname)?;
                reference.set_target(incoming.id(), "datashelf: fast-forward")?;
                repo.set_head(&refname)?;
                repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
                info!("fast-forwarded {} to {}", branch, incoming.id());
            } else {
                return Err(StorageError::NonFastForward { branch });
            }

            let head = repo.head()?.peel_to_commit()?;
            Ok(CommitId::new(head.id()))
        })
    }
}
