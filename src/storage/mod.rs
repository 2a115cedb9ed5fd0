//! Storage layer for docsift
//!
//! The pipeline talks to persistence through three narrow traits: a keyed
//! document store, a single-slot catalog store and a single-slot credential
//! store. [`Database`] implements all three on SQLite.

pub mod database;

use crate::catalog::Catalog;
use crate::document::Document;
use crate::error::{DocsiftError, Result};
use std::path::{Path, PathBuf};

pub use database::{Database, DbPool, DbStats};

/// Keyed document persistence. `put` is an upsert; last write wins.
pub trait DocumentStore {
    fn get(&self, id: &str) -> Result<Option<Document>>;
    fn put(&self, document: &Document) -> Result<()>;
    /// All documents, oldest first
    fn list(&self) -> Result<Vec<Document>>;
    fn clear(&self) -> Result<()>;
}

/// Single-slot catalog persistence, replaced as a whole
pub trait CatalogStore {
    fn get_catalog(&self) -> Result<Catalog>;
    fn put_catalog(&self, catalog: &Catalog) -> Result<()>;
    fn clear_catalog(&self) -> Result<()>;
}

/// Single-slot credential persistence
pub trait CredentialSlot {
    fn load_credential(&self) -> Result<Option<String>>;
    fn store_credential(&self, secret: &str) -> Result<()>;
}

/// Everything the pipeline needs from persistence
pub trait Store: DocumentStore + CatalogStore + CredentialSlot {}

impl<T: DocumentStore + CatalogStore + CredentialSlot> Store for T {}

/// Opens the on-disk layout under the data directory
pub struct StorageManager {
    pub database: Database,
    base_path: PathBuf,
}

impl StorageManager {
    /// Create the data directory if needed and open the database
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path).map_err(|e| DocsiftError::Io {
            source: e,
            context: format!("Failed to create data directory: {}", base_path.display()),
        })?;

        let database = Database::new(&base_path.join("docsift.sqlite"))?;

        Ok(Self {
            database,
            base_path,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the SQLite file
    pub fn database_path(&self) -> PathBuf {
        self.base_path.join("docsift.sqlite")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested").join("data");
        let storage = StorageManager::new(data_dir.clone()).unwrap();

        assert!(data_dir.exists());
        assert!(storage.database_path().exists());
        assert_eq!(storage.base_path(), data_dir.as_path());
    }
}
