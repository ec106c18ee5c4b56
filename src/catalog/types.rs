//! Identifiers for the repositories of a store.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::table::ID_SEPARATOR;

/// Literal name of the umbrella repository.
pub const MAIN: &str = "main";

/// A validated source ID.
///
/// Source IDs name a directory under `database/` and form the last
/// structural field of every table ID, so they are restricted to ASCII
/// letters, digits, `_`, `-` and `.`, and may not contain the structural
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    const MAX_LEN: usize = 128;

    pub fn new(id: impl Into<String>) -> CatalogResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> CatalogResult<()> {
        let invalid = |reason: &str| CatalogError::InvalidSourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(invalid("empty"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(invalid("too long"));
        }
        if id.starts_with('.') || id.starts_with('-') {
            return Err(invalid("must start with a letter, digit or underscore"));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(&format!("invalid character {:?}", c)));
        }
        if id.contains(ID_SEPARATOR) {
            return Err(invalid("contains the table ID separator"));
        }
        if id.eq_ignore_ascii_case(MAIN) {
            return Err(invalid("reserved for the main repository"));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SourceId {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// One repository of a store: a source or the umbrella repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepoId {
    Main,
    Source(SourceId),
}

impl RepoId {
    /// Parse `"main"` or a source ID.
    pub fn parse(id: &str) -> CatalogResult<Self> {
        if id == MAIN {
            Ok(RepoId::Main)
        } else {
            SourceId::new(id).map(RepoId::Source)
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, RepoId::Main)
    }

    pub fn as_source(&self) -> Option<&SourceId> {
        match self {
            RepoId::Source(id) => Some(id),
            RepoId::Main => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RepoId::Main => MAIN,
            RepoId::Source(id) => id.as_str(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<SourceId> for RepoId {
    fn from(id: SourceId) -> Self {
        RepoId::Source(id)
    }
}
