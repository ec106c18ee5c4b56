//! On-disk layout of a store and its bootstrap.
//!
//! ```text
//! <root>/
//!   .git/              main repository
//!   .gitignore         keeps database/, rawdata/ and exports/ out of main
//!   sources.csv        source catalog
//!   inventory.csv      table inventory
//!   mappings/          spatial mapping files
//!   rawdata/
//!   database/<source>/ one repository per source
//! ```

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::catalog::{SourceCatalog, SOURCES_FILE};
use crate::db::error::{StoreError, StoreResult};
use crate::inventory::InventoryIndex;
use crate::storage::{CommitMessage, GitRepository, GitSignature, VersionControl};
use crate::table::DEFAULT_MAPPINGS;

pub const INVENTORY_FILE: &str = "inventory.csv";
pub const SOURCE_INVENTORY_FILE: &str = "source_inventory.csv";
pub const MAPPINGS_DIR: &str = "mappings";
pub const RAWDATA_DIR: &str = "rawdata";
pub const GITIGNORE_FILE: &str = ".gitignore";
pub const GITIGNORE: &str = "database/\nrawdata/\nexports/\n";

/// A store exists at `path` once its inventory file does.
pub fn is_initialized(path: &Path) -> bool {
    path.join(INVENTORY_FILE).is_file()
}

/// Bootstrap an empty store backed by git.
pub fn create_empty_store(path: &Path, force_new: bool) -> StoreResult<()> {
    init_store::<GitRepository>(path, force_new)
}

/// Bootstrap an empty store at `path` and commit it to a fresh main
/// repository. With `force_new` anything already at `path` is deleted first.
pub fn init_store<R: VersionControl>(path: &Path, force_new: bool) -> StoreResult<()> {
    if path.exists() {
        if force_new {
            warn!("wiping {}", path.display());
            fs::remove_dir_all(path)?;
        } else if is_initialized(path) || path.join(".git").exists() {
            return Err(StoreError::AlreadyExists(path.to_path_buf()));
        }
    }

    for dir in ["", crate::catalog::DATABASE_DIR, MAPPINGS_DIR, RAWDATA_DIR] {
        fs::create_dir_all(path.join(dir))?;
    }
    for (name, contents) in DEFAULT_MAPPINGS {
        fs::write(path.join(MAPPINGS_DIR).join(name), contents)?;
    }
    SourceCatalog::new().persist(&path.join(SOURCES_FILE))?;
    InventoryIndex::new().persist(&path.join(INVENTORY_FILE))?;
    fs::write(path.join(GITIGNORE_FILE), GITIGNORE)?;

    let main = R::init(path)?;
    main.stage_file(Path::new(GITIGNORE_FILE))?;
    main.stage_file(Path::new(SOURCES_FILE))?;
    main.stage_file(Path::new(INVENTORY_FILE))?;
    for (name, _) in DEFAULT_MAPPINGS {
        main.stage_file(&Path::new(MAPPINGS_DIR).join(name))?;
    }
    let head = main.commit(CommitMessage::initialize(), &GitSignature::datashelf())?;

    info!("initialized store at {} ({})", path.display(), head.short());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_empty_store() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("shelf");
        assert!(!is_initialized(&root));

        create_empty_store(&root, false).unwrap();
        assert!(is_initialized(&root));
        for dir in ["database", "mappings", "rawdata"] {
            assert!(root.join(dir).is_dir(), "{} missing", dir);
        }
        assert!(root.join("mappings/country_codes.csv").is_file());
        assert_eq!(fs::read_to_string(root.join(".gitignore")).unwrap(), GITIGNORE);
        assert_eq!(
            fs::read_to_string(root.join("inventory.csv")).unwrap().trim(),
            crate::inventory::INVENTORY_HEADER.join(",")
        );

        let main = GitRepository::open(&root).unwrap();
        assert!(!main.is_dirty().unwrap());
        let history = main.history(None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].summary(), "Initialize datashelf");
    }

    #[test]
    fn test_existing_store_needs_force() {
        let dir = TempDir::new().unwrap();
        create_empty_store(dir.path(), false).unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        assert!(matches!(
            create_empty_store(dir.path(), false),
            Err(StoreError::AlreadyExists(_))
        ));

        create_empty_store(dir.path(), true).unwrap();
        assert!(!dir.path().join("stray.txt").exists());
        assert!(is_initialized(dir.path()));
    }

    #[test]
    fn test_force_wipes_directory_without_store() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("shelf");
        fs::create_dir_all(root.join("notes")).unwrap();
        fs::write(root.join("notes/todo.txt"), "x").unwrap();
        fs::write(root.join("stray.csv"), "x").unwrap();

        create_empty_store(&root, true).unwrap();
        assert!(!root.join("notes").exists());
        assert!(!root.join("stray.csv").exists());
        assert!(!GitRepository::open(&root).unwrap().is_dirty().unwrap());
    }
}
