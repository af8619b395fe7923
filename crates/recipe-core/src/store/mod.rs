//! Store: SQLite-backed persistence for users, tokens and recipes.
//!
//! Every recipe, tag and ingredient query takes the owning `user_id`, so a
//! row belonging to someone else is indistinguishable from a missing one.

mod labels;
mod recipes;
pub mod schema;
mod users;

use crate::config::DatabaseConfig;
use crate::security::PasswordManager;
use crate::{RecipeError, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use schema::RECIPE_SCHEMA;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const MEMORY_PATH: &str = ":memory:";

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    passwords: Arc<PasswordManager>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open a file-backed store, creating parent directories as needed.
    /// `:memory:` opens an in-memory store instead.
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str() == MEMORY_PATH {
            return Self::memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            passwords: Arc::new(PasswordManager::new()),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        if let Err(e) = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0)) {
            warn!(error = %e, "Could not enable WAL journal mode");
        }
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(RECIPE_SCHEMA)?;
        Ok(())
    }

    /// Cheap liveness check.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Keeps trying to open and ping the database until it answers or
/// `attempts` run out. Returns the last error on failure.
pub fn wait_for_store(path: &Path, attempts: u32, interval: Duration) -> Result<Store> {
    info!(path = %path.display(), "Waiting for database...");
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match Store::open(path).and_then(|store| store.ping().map(|_| store)) {
            Ok(store) => {
                info!(attempt, "Database available");
                return Ok(store);
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Database unavailable");
                last_err = Some(e);
                if attempt < attempts {
                    std::thread::sleep(interval);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| RecipeError::NotFound("database".into())))
}

/// [`wait_for_store`] driven by the `database` config section.
pub fn wait_for_configured_store(config: &DatabaseConfig) -> Result<Store> {
    wait_for_store(
        Path::new(&config.path),
        config.wait_attempts,
        config.wait_interval(),
    )
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_pings() {
        let store = Store::memory().unwrap();
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recipes.db");
        let store = Store::open(&path).unwrap();
        store.ping().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("recipes.db")).unwrap();
        let mode: String = store
            .conn
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_wait_for_store_succeeds_first_try() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.db");
        let store = wait_for_store(&path, 3, Duration::from_millis(1)).unwrap();
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_wait_for_store_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        // A directory can never be opened as a database file.
        let path = dir.path().to_path_buf();
        let result = wait_for_store(&path, 2, Duration::from_millis(1));
        assert!(result.is_err());
    }
}
