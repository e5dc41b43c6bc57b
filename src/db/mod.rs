//! Database module for profiles, dedupe records, conversation memory and escalations

pub mod conversation;
pub mod dedupe;
pub mod escalation;
pub mod profile;
mod schema;

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use conversation::{ConversationEntry, ConversationRepo, NewConversationEntry};
pub use dedupe::SqliteDedupe;
pub use escalation::{EscalationAck, EscalationItem, EscalationRepo, EscalationSink, EscalationStatus};
pub use profile::{Profile, ProfileRepo};
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Check out a connection, mapping pool exhaustion to a database error
pub(crate) fn conn(pool: &DbPool) -> Result<DbConn> {
    pool.get().map_err(|e| Error::Database(e.to_string()))
}

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets the sweeper delete while webhook handlers read
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
    });
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    // Run migrations on first connection
    let conn = conn(&pool)?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = conn(&pool)?;
    schema::init(&conn)?;

    Ok(pool)
}

/// Check that the database answers a trivial query
///
/// # Errors
///
/// Returns error if no connection is available or the query fails
pub fn ping(pool: &DbPool) -> Result<()> {
    let conn = conn(pool)?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory().unwrap();
        ping(&pool).unwrap();
    }

    #[test]
    fn test_init_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("concierge.db");
        let pool = init(&path).unwrap();
        ping(&pool).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_init_is_rerunnable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.db");
        drop(init(&path).unwrap());
        let pool = init(&path).unwrap();
        let conn = pool.get().unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
