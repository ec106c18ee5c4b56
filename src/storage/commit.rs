//!  Commit creation and history traversal
//!
//!  commits are the atomic units of change in a datashelf:
//! - every source repository gets one commit per store-level commit touching it
//! - the main repository gets one commit per store-level commit, always last
//! - the head hash of each source is the consistency fingerprint kept in `sources.csv`
//!
//! this module handles commit creation from the index and history walking

use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, Repository, Revwalk, Sort};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CommitId, GitSignature};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// check if this is the root commit of its repository
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating a commit out of the current index
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    message: String,
    signature: GitSignature,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            message: String::new(),
            signature: GitSignature::datashelf(),
        }
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// write the index as a tree and commit it on top of HEAD
    ///
    /// an unborn HEAD yields a root commit
    pub fn commit(self) -> StorageResult<CommitId> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let sig = self.signature.to_git2_signature()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(StorageError::Git(e)),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, &self.message, &tree, &parents)?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(StorageError::Git(e))),
            },
            Err(e) => Some(Err(StorageError::Git(e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: CommitId) -> StorageResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

/// message formatting for store operations
pub struct CommitMessage;

impl CommitMessage {
    /// stamp the crunching user onto a caller-supplied message
    pub fn by(message: &str, cruncher: &str) -> String {
        format!("{} by {}", message, cruncher)
    }

    /// message for removing a single table
    pub fn table_removed() -> &'static str {
        "Table removed"
    }

    /// message for removing several tables at once
    pub fn tables_removed() -> &'static str {
        "Tables removed"
    }

    /// message for dropping an entire source
    pub fn source_deleted(source: &str) -> String {
        format!("{} deleted", source)
    }

    /// message for cloning a source from the remote
    pub fn source_imported(source: &str) -> String {
        format!("imported {}", source)
    }

    /// message for pulling a source update from the remote
    pub fn source_updated() -> &'static str {
        "update from remote"
    }

    /// message for the bootstrap commit of the main repository
    pub fn initialize() -> &'static str {
        "Initialize datashelf"
    }
}
