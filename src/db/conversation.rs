//! Conversation memory: append-only, per-user, time-bounded turn log
//!
//! Entries are never updated. Expired entries stay invisible to readers
//! until the retention sweeper deletes them.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::DbPool;
use crate::Result;
use crate::assistant::Action;
use crate::classifier::Intent;

/// Column list for all conversation SELECT queries
const ENTRY_COLUMNS: &str =
    "id, user_id, user_text, assistant_text, intent, confidence, action, created_at_ms, expires_at_ms";

/// One stored turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub id: String,
    pub user_id: String,
    pub user_text: String,
    /// Reply actually sent, empty when none
    pub assistant_text: String,
    pub intent: Intent,
    pub confidence: f32,
    pub action: Action,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

/// A turn to append; timestamps are assigned by the repository
#[derive(Debug, Clone)]
pub struct NewConversationEntry {
    pub user_id: String,
    pub user_text: String,
    pub assistant_text: String,
    pub intent: Intent,
    pub confidence: f32,
    pub action: Action,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationEntry> {
    let intent: String = row.get(4)?;
    let action: String = row.get(6)?;
    let confidence: f64 = row.get(5)?;
    #[allow(clippy::cast_possible_truncation)]
    let confidence = confidence as f32;
    Ok(ConversationEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_text: row.get(2)?,
        assistant_text: row.get(3)?,
        intent: Intent::from_str_value(&intent).unwrap_or(Intent::Unknown),
        confidence,
        action: Action::from_str_value(&action).unwrap_or(Action::Escalate),
        created_at_ms: row.get(7)?,
        expires_at_ms: row.get(8)?,
    })
}

/// Conversation memory repository
#[derive(Debug, Clone)]
pub struct ConversationRepo {
    pool: DbPool,
    retention_ms: i64,
}

impl ConversationRepo {
    /// Create a repository whose entries live for `retention`
    #[must_use]
    pub fn new(pool: DbPool, retention: Duration) -> Self {
        Self {
            pool,
            retention_ms: i64::try_from(retention.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Append a turn with `expires_at_ms = now_ms + retention`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, entry: &NewConversationEntry, now_ms: i64) -> Result<ConversationEntry> {
        let conn = super::conn(&self.pool)?;
        let stored = ConversationEntry {
            id: format!("log_{}", Uuid::new_v4()),
            user_id: entry.user_id.clone(),
            user_text: entry.user_text.clone(),
            assistant_text: entry.assistant_text.clone(),
            intent: entry.intent,
            confidence: entry.confidence,
            action: entry.action,
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(self.retention_ms),
        };

        conn.execute(
            r"INSERT INTO conversation_logs (id, user_id, user_text, assistant_text, intent, confidence, action, created_at_ms, expires_at_ms)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                stored.id,
                stored.user_id,
                stored.user_text,
                stored.assistant_text,
                stored.intent.as_str(),
                f64::from(stored.confidence),
                stored.action.as_str(),
                stored.created_at_ms,
                stored.expires_at_ms,
            ],
        )?;

        Ok(stored)
    }

    /// Up to `limit` most recent unexpired entries, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent(&self, user_id: &str, limit: usize, now_ms: i64) -> Result<Vec<ConversationEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = super::conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM conversation_logs
             WHERE user_id = ?1 AND expires_at_ms > ?2
             ORDER BY created_at_ms DESC, seq DESC
             LIMIT ?3"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut entries = stmt
            .query_map(rusqlite::params![user_id, now_ms, limit], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.reverse();
        Ok(entries)
    }

    /// Every unexpired entry for a user, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn history(&self, user_id: &str, now_ms: i64) -> Result<Vec<ConversationEntry>> {
        let conn = super::conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM conversation_logs
             WHERE user_id = ?1 AND expires_at_ms > ?2
             ORDER BY created_at_ms ASC, seq ASC"
        ))?;

        let entries = stmt
            .query_map(rusqlite::params![user_id, now_ms], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Stored rows for a user, expired-but-unswept included
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_user(&self, user_id: &str) -> Result<usize> {
        let conn = super::conn(&self.pool)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversation_logs WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Delete entries with `expires_at_ms <= now_ms`; sweeper only
    pub(crate) fn purge_expired(&self, now_ms: i64) -> Result<usize> {
        let conn = super::conn(&self.pool)?;
        let removed = conn.execute(
            "DELETE FROM conversation_logs WHERE expires_at_ms <= ?1",
            [now_ms],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const HOUR_MS: i64 = 3_600_000;

    fn repo() -> ConversationRepo {
        ConversationRepo::new(db::init_memory().unwrap(), Duration::from_secs(3600))
    }

    fn turn(user_id: &str, text: &str) -> NewConversationEntry {
        NewConversationEntry {
            user_id: user_id.to_string(),
            user_text: text.to_string(),
            assistant_text: format!("re: {text}"),
            intent: Intent::General,
            confidence: 0.5,
            action: Action::Clarify,
        }
    }

    #[test]
    fn test_append_sets_expiry() {
        let repo = repo();
        let entry = repo.append(&turn("u1", "hello"), 1_000).unwrap();
        assert_eq!(entry.created_at_ms, 1_000);
        assert_eq!(entry.expires_at_ms, 1_000 + HOUR_MS);
        assert!(entry.id.starts_with("log_"));
    }

    #[test]
    fn test_recent_window_is_chronological() {
        let repo = repo();
        for (i, text) in ["one", "two", "three", "four"].iter().enumerate() {
            repo.append(&turn("u1", text), 1_000 + i64::try_from(i).unwrap()).unwrap();
        }
        repo.append(&turn("u2", "other user"), 1_500).unwrap();

        let recent = repo.recent("u1", 3, 2_000).unwrap();
        let texts: Vec<&str> = recent.iter().map(|e| e.user_text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three", "four"]);
    }

    #[test]
    fn test_same_millisecond_keeps_append_order() {
        let repo = repo();
        repo.append(&turn("u1", "first"), 5_000).unwrap();
        repo.append(&turn("u1", "second"), 5_000).unwrap();

        let recent = repo.recent("u1", 10, 5_000).unwrap();
        assert_eq!(recent[0].user_text, "first");
        assert_eq!(recent[1].user_text, "second");
    }

    #[test]
    fn test_recent_hides_expired_before_sweep() {
        let repo = repo();
        repo.append(&turn("u1", "old"), 0).unwrap();
        repo.append(&turn("u1", "new"), HOUR_MS / 2).unwrap();

        // Exactly at expiry the old entry is gone
        let recent = repo.recent("u1", 10, HOUR_MS).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_text, "new");
        assert_eq!(repo.count_for_user("u1").unwrap(), 2);
    }

    #[test]
    fn test_purge_expired_boundary() {
        let repo = repo();
        repo.append(&turn("u1", "a"), 0).unwrap();
        repo.append(&turn("u1", "b"), 10).unwrap();

        assert_eq!(repo.purge_expired(HOUR_MS).unwrap(), 1);
        assert_eq!(repo.purge_expired(HOUR_MS).unwrap(), 0);
        assert_eq!(repo.history("u1", HOUR_MS).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_limit() {
        let repo = repo();
        repo.append(&turn("u1", "a"), 0).unwrap();
        assert!(repo.recent("u1", 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_round_trips_intent_and_action() {
        let repo = repo();
        let mut t = turn("u1", "need actors");
        t.intent = Intent::TalentSearch;
        t.action = Action::Answer;
        t.confidence = 0.85;
        repo.append(&t, 0).unwrap();

        let stored = &repo.recent("u1", 1, 0).unwrap()[0];
        assert_eq!(stored.intent, Intent::TalentSearch);
        assert_eq!(stored.action, Action::Answer);
        assert!((stored.confidence - 0.85).abs() < 1e-6);
    }
}
