//! SQLite-backed ingredient catalog.
//!
//! Ingredients and substitution logs are stored as JSON documents so the
//! schema stays stable as document fields evolve:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS ingredients (
//!     name       TEXT PRIMARY KEY,   -- lower-cased canonical name
//!     data       TEXT NOT NULL,      -- IngredientRecord JSON
//!     updated_at TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS substitution_logs (
//!     id         INTEGER PRIMARY KEY AUTOINCREMENT,
//!     data       TEXT NOT NULL,      -- SubstitutionLogEntry JSON
//!     picked     INTEGER NOT NULL,   -- 1 if any substitute was picked
//!     created_at TEXT NOT NULL
//! );
//! ```
//!
//! Uniqueness of canonical names is enforced by the primary key.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::config::CatalogConfig;
use crate::error::{PantryError, Result};
use crate::types::{IngredientRecord, SubstitutionLogEntry, VocabularyEntry};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS ingredients (
        name       TEXT PRIMARY KEY,
        data       TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS substitution_logs (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        data       TEXT NOT NULL,
        picked     INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );";

/// Handle to an open SQLite catalog.
///
/// # Usage
///
/// ```no_run
/// # use pantry_core::persistence::SqliteCatalog;
/// # use pantry_core::config::CatalogConfig;
/// # use pantry_core::types::{IngredientRecord, VocabularyEntry};
/// let catalog = SqliteCatalog::open("pantry.db", &CatalogConfig::default())?;
/// catalog.upsert_ingredient(&IngredientRecord::new(
///     VocabularyEntry::new("butter"),
///     vec!["ghee".into()],
/// ))?;
/// # Ok::<(), pantry_core::error::PantryError>(())
/// ```
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &CatalogConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Pantry catalog opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Seeding writes
    // ------------------------------------------------------------------

    /// Insert or replace an ingredient document.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Serialization`] if JSON encoding fails, or
    /// [`PantryError::Database`] on SQLite failures.
    pub fn upsert_ingredient(&self, record: &IngredientRecord) -> Result<()> {
        let key = record.entry.key();
        if key.is_empty() {
            return Err(PantryError::Store("ingredient has an empty canonical name".into()));
        }
        let json = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        self.conn.lock().execute(
            "INSERT INTO ingredients (name, data, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![key, json, now],
        )?;

        debug!(ingredient = %key, substitutes = record.substitutes.len(), "Upserted ingredient");
        Ok(())
    }

    /// Append a historical substitution log entry.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Serialization`] or [`PantryError::Database`].
    pub fn append_log(&self, entry: &SubstitutionLogEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        let created_at = entry.created_at.unwrap_or_else(Utc::now).to_rfc3339();
        self.conn.lock().execute(
            "INSERT INTO substitution_logs (data, picked, created_at) VALUES (?1, ?2, ?3)",
            params![json, i64::from(entry.has_pick()), created_at],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Load one full ingredient document.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Database`] or [`PantryError::Serialization`].
    pub fn load_ingredient(&self, canonical_name: &str) -> Result<Option<IngredientRecord>> {
        let key = canonical_name.trim().to_lowercase();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT data FROM ingredients WHERE name = ?1")?;
        let data: Option<String> = stmt
            .query_row(params![key], |row| row.get(0))
            .optional()?;

        data.map(|json| serde_json::from_str(&json).map_err(PantryError::from))
            .transpose()
    }

    /// Number of stored ingredients.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Database`] on SQLite failures.
    pub fn ingredient_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Return the path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn query_ingredients(&self) -> Result<Vec<VocabularyEntry>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT name, data FROM ingredients ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let data: String = row.get(1)?;
            Ok((name, data))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (name, data) = row?;
            match serde_json::from_str::<IngredientRecord>(&data) {
                Ok(record) => entries.push(record.entry),
                Err(e) => warn!(ingredient = %name, error = %e, "Skipping unreadable ingredient document"),
            }
        }

        debug!(
            ingredients = entries.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded catalog vocabulary"
        );
        Ok(entries)
    }

    fn query_picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT id, data FROM substitution_logs WHERE picked = 1 ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let data: String = row.get(1)?;
            Ok((id, data))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, data) = row?;
            match serde_json::from_str::<SubstitutionLogEntry>(&data) {
                Ok(entry) => logs.push(entry),
                Err(e) => warn!(log_id = id, error = %e, "Skipping unreadable log entry"),
            }
        }
        Ok(logs)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn all_ingredients(&self) -> Result<Vec<VocabularyEntry>> {
        self.query_ingredients()
    }

    async fn stored_substitutes(&self, canonical_name: &str) -> Result<Vec<String>> {
        Ok(self
            .load_ingredient(canonical_name)?
            .map(|record| record.substitutes)
            .unwrap_or_default())
    }

    async fn picked_logs(&self) -> Result<Vec<SubstitutionLogEntry>> {
        self.query_picked_logs()
    }
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
///
/// Converts `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
