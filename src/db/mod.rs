//! SQLite store for the signal log.
//!
//! The database lives at `~/.lifeos/lifeos.db`; every agent process opens the
//! same file. WAL mode keeps concurrent readers cheap while writers proceed
//! one at a time. `SignalDb` owns a single connection behind a mutex so one
//! store handle can be shared across threads (`rusqlite::Connection` is Send
//! but not Sync).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use thiserror::Error;

mod signals;

// ---------------------------------------------------------------------------
// Dev DB isolation
// ---------------------------------------------------------------------------

/// Process-wide flag steering `SignalDb::db_path()` between live and dev
/// files. Agents open the store independently at startup; the static flag
/// means they all pick up the right path without plumbing config through
/// every entry point.
static DEV_DB_MODE: AtomicBool = AtomicBool::new(false);

/// Activate dev-mode DB isolation. All subsequent `SignalDb::open()` calls
/// will target `~/.lifeos/lifeos-dev.db` instead of `lifeos.db`.
pub fn set_dev_db_mode(enabled: bool) {
    DEV_DB_MODE.store(enabled, Ordering::Relaxed);
}

/// Check whether dev-mode DB isolation is active.
pub fn is_dev_db_mode() -> bool {
    DEV_DB_MODE.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors specific to store operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

pub struct SignalDb {
    conn: Mutex<Connection>,
}

impl SignalDb {
    /// Lock and borrow the underlying connection for ad-hoc queries.
    ///
    /// The mutex is not reentrant: drop the guard before calling any other
    /// `SignalDb` method.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&conn) {
            Ok(val) => {
                conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.lifeos/lifeos.db` and apply the
    /// schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Used by config overrides and
    /// tests.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for cheap concurrent reads across agent processes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Resolve the default database path: `~/.lifeos/lifeos.db`.
    ///
    /// When dev-mode DB isolation is active (`set_dev_db_mode(true)`),
    /// returns `~/.lifeos/lifeos-dev.db` instead.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        let lifeos_dir = home.join(".lifeos");

        if is_dev_db_mode() {
            return Ok(lifeos_dir.join("lifeos-dev.db"));
        }

        Ok(lifeos_dir.join("lifeos.db"))
    }
}

pub mod test_utils {
    use super::SignalDb;

    /// Create a temporary database for testing.
    ///
    /// The `TempDir` is leaked so the directory persists for the duration of
    /// the test; the OS cleans up test temp dirs.
    pub fn test_db() -> SignalDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        SignalDb::open_at(path).expect("Failed to open test database")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_creates_schema() {
        let db = test_db();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM agent_signals", [], |row| row.get(0))
            .expect("signal table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("reopen.db");
        {
            let db = SignalDb::open_at(path.clone()).expect("first open");
            db.conn()
                .execute(
                    "INSERT INTO agent_signals (id, source_agent, signal_type, message,
                     expires_at, created_at)
                     VALUES ('sig-a', 'finance', 'budget_alert', 'm',
                     '2026-01-02T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
                    [],
                )
                .expect("insert");
        }
        let db = SignalDb::open_at(path).expect("second open");
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM agent_signals", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1, "reopening must not clobber data");
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        db.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO agent_signals (id, source_agent, signal_type, message,
                 expires_at, created_at)
                 VALUES ('sig-tx', 'health', 'workout_missed', 'm',
                 '2026-01-02T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
                [],
            )?;
            Ok(())
        })
        .expect("transaction should commit");

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM agent_signals", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO agent_signals (id, source_agent, signal_type, message,
                 expires_at, created_at)
                 VALUES ('sig-rb', 'health', 'workout_missed', 'm',
                 '2026-01-02T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
                [],
            )?;
            // Second statement fails, the insert above must not survive
            conn.execute("INSERT INTO no_such_table (x) VALUES (1)", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM agent_signals", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0, "rollback should discard the insert");
    }

    #[test]
    fn test_dev_db_mode_toggle() {
        assert!(!is_dev_db_mode());
        set_dev_db_mode(true);
        assert!(is_dev_db_mode());
        set_dev_db_mode(false);
        assert!(!is_dev_db_mode());
    }
}
