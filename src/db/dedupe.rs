//! `SQLite`-backed dedupe store

use std::time::Duration;

use super::DbPool;
use crate::Result;
use crate::dedupe::{DedupeStore, ttl_ms};

/// Dedupe records persisted in `processed_events`
#[derive(Debug, Clone)]
pub struct SqliteDedupe {
    pool: DbPool,
    ttl_ms: i64,
}

impl SqliteDedupe {
    /// Create a store remembering ids for `ttl`
    #[must_use]
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl_ms: ttl_ms(ttl),
        }
    }
}

impl DedupeStore for SqliteDedupe {
    fn seen_or_record(&self, event_id: &str, now_ms: i64) -> Result<bool> {
        let conn = super::conn(&self.pool)?;

        // Single statement: inserts a new id, or takes over an expired record.
        // An unexpired record makes the upsert a no-op (0 rows changed).
        let changed = conn.execute(
            r"INSERT INTO processed_events (event_id, processed_at_ms, expires_at_ms)
              VALUES (?1, ?2, ?3)
              ON CONFLICT(event_id) DO UPDATE SET
                processed_at_ms = excluded.processed_at_ms,
                expires_at_ms = excluded.expires_at_ms
              WHERE processed_events.expires_at_ms <= excluded.processed_at_ms",
            rusqlite::params![event_id, now_ms, now_ms.saturating_add(self.ttl_ms)],
        )?;

        Ok(changed == 0)
    }

    fn purge_expired(&self, now_ms: i64) -> Result<usize> {
        let conn = super::conn(&self.pool)?;
        let removed = conn.execute(
            "DELETE FROM processed_events WHERE expires_at_ms <= ?1",
            [now_ms],
        )?;
        Ok(removed)
    }
}
