//! SQLite database management with migrations
//!
//! Documents are stored as JSON records keyed by id; the catalog and the
//! credential live in single-row slots.

use crate::catalog::Catalog;
use crate::document::Document;
use crate::error::{DocsiftError, Result};
use crate::storage::{CatalogStore, CredentialSlot, DocumentStore};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const CATALOG_SLOT: &str = "catalog";
const CREDENTIAL_SLOT: &str = "credential";

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocsiftError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| DocsiftError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool.get()?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let categorized_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE category IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let has_catalog: i64 = conn.query_row(
            "SELECT COUNT(*) FROM slots WHERE name = ?1",
            params![CATALOG_SLOT],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            categorized_count: categorized_count as usize,
            has_catalog: has_catalog > 0,
        })
    }

    fn read_slot(&self, name: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM slots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO slots (name, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, value],
        )?;
        Ok(())
    }

    fn decode_document(record: &str) -> Result<Document> {
        serde_json::from_str(record).map_err(|e| DocsiftError::Json {
            source: e,
            context: "Failed to deserialize document record".to_string(),
        })
    }
}

impl DocumentStore for Database {
    fn get(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.get_conn()?;
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        record.as_deref().map(Self::decode_document).transpose()
    }

    fn put(&self, document: &Document) -> Result<()> {
        let record = serde_json::to_string(document).map_err(|e| DocsiftError::Json {
            source: e,
            context: format!("Failed to serialize document {}", document.id),
        })?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO documents (id, category, record, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                record = excluded.record,
                updated_at = excluded.updated_at",
            params![
                document.id,
                document.category,
                record,
                document
                    .created_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Document>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT record FROM documents ORDER BY created_at, rowid")?;
        let records = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        records.iter().map(|r| Self::decode_document(r)).collect()
    }

    fn clear(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM documents", [])?;
        Ok(())
    }
}

impl CatalogStore for Database {
    fn get_catalog(&self) -> Result<Catalog> {
        match self.read_slot(CATALOG_SLOT)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| DocsiftError::Json {
                source: e,
                context: "Failed to deserialize catalog".to_string(),
            }),
            None => Ok(Catalog::new()),
        }
    }

    fn put_catalog(&self, catalog: &Catalog) -> Result<()> {
        let raw = serde_json::to_string(catalog).map_err(|e| DocsiftError::Json {
            source: e,
            context: "Failed to serialize catalog".to_string(),
        })?;
        self.write_slot(CATALOG_SLOT, &raw)
    }

    fn clear_catalog(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM slots WHERE name = ?1", params![CATALOG_SLOT])?;
        Ok(())
    }
}

impl CredentialSlot for Database {
    fn load_credential(&self) -> Result<Option<String>> {
        Ok(self
            .read_slot(CREDENTIAL_SLOT)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    fn store_credential(&self, secret: &str) -> Result<()> {
        self.write_slot(CREDENTIAL_SLOT, secret.trim())
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub document_count: usize,
    pub categorized_count: usize,
    pub has_catalog: bool,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- One JSON record per document
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        category TEXT,
        record TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX idx_documents_category ON documents(category);
    CREATE INDEX idx_documents_created_at ON documents(created_at);

    -- Single-value slots (catalog, credential)
    CREATE TABLE slots (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
];
