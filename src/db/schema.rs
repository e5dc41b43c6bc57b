//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- User profiles, upserted by operators
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            display_name TEXT,
            language TEXT,
            interests TEXT NOT NULL DEFAULT '[]',
            location TEXT,
            goal TEXT,
            updated_at_ms INTEGER NOT NULL
        );

        -- Processed webhook event ids
        CREATE TABLE IF NOT EXISTS processed_events (
            event_id TEXT PRIMARY KEY,
            processed_at_ms INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_processed_events_expiry ON processed_events(expires_at_ms);

        -- Append-only conversation memory
        CREATE TABLE IF NOT EXISTS conversation_logs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            user_text TEXT NOT NULL,
            assistant_text TEXT NOT NULL,
            intent TEXT NOT NULL,
            confidence REAL NOT NULL,
            action TEXT NOT NULL CHECK(action IN ('answer', 'clarify', 'escalate')),
            created_at_ms INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversation_logs_user ON conversation_logs(user_id, created_at_ms);
        CREATE INDEX IF NOT EXISTS idx_conversation_logs_expiry ON conversation_logs(expires_at_ms);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Human follow-up queue
        CREATE TABLE IF NOT EXISTS escalations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            user_text TEXT NOT NULL,
            classification TEXT NOT NULL,
            suggested_reply TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open', 'resolved')),
            created_at_ms INTEGER NOT NULL,
            resolved_at_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_escalations_status ON escalations(status, created_at_ms);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
