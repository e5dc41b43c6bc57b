//! Escalation queue for human follow-up

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DbPool;
use crate::classifier::Classification;
use crate::{Error, Result};

/// Review state of an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationStatus {
    Open,
    Resolved,
}

impl EscalationStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }

    /// Parse the storage form
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A user turn handed to a human reviewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationItem {
    pub id: String,
    pub user_id: String,
    pub user_text: String,
    /// Snapshot of the classification that triggered the hand-off
    pub classification: Classification,
    /// Draft for the reviewer; always empty for sensitive matters
    pub suggested_reply: String,
    pub status: EscalationStatus,
    pub created_at_ms: i64,
}

impl EscalationItem {
    /// Create an open escalation
    ///
    /// The suggestion is dropped when the classification is sensitive.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_text: impl Into<String>,
        classification: Classification,
        suggested_reply: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        let suggested_reply = if classification.is_sensitive {
            String::new()
        } else {
            suggested_reply.into()
        };
        Self {
            id: format!("esc_{}", Uuid::new_v4()),
            user_id: user_id.into(),
            user_text: user_text.into(),
            classification,
            suggested_reply,
            status: EscalationStatus::Open,
            created_at_ms: now_ms,
        }
    }
}

/// Acknowledgement returned once an escalation is durably recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationAck {
    pub id: String,
    /// Open items including this one
    pub queue_length: usize,
}

/// Destination for escalated turns
#[async_trait]
pub trait EscalationSink: Send + Sync {
    /// Record an escalation for human follow-up
    ///
    /// # Errors
    ///
    /// Returns error if the item cannot be stored
    async fn record(&self, item: &EscalationItem) -> Result<EscalationAck>;
}

const ESCALATION_COLUMNS: &str =
    "id, user_id, user_text, classification, suggested_reply, status, created_at_ms";

/// Raw database row, before the classification JSON is decoded
struct EscalationRow {
    id: String,
    user_id: String,
    user_text: String,
    classification: String,
    suggested_reply: String,
    status: String,
    created_at_ms: i64,
}

fn row_to_escalation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EscalationRow> {
    Ok(EscalationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_text: row.get(2)?,
        classification: row.get(3)?,
        suggested_reply: row.get(4)?,
        status: row.get(5)?,
        created_at_ms: row.get(6)?,
    })
}

impl EscalationRow {
    fn into_item(self) -> Result<EscalationItem> {
        Ok(EscalationItem {
            id: self.id,
            user_id: self.user_id,
            user_text: self.user_text,
            classification: serde_json::from_str(&self.classification)?,
            suggested_reply: self.suggested_reply,
            status: EscalationStatus::from_str_value(&self.status).unwrap_or(EscalationStatus::Open),
            created_at_ms: self.created_at_ms,
        })
    }
}

/// Escalation repository
#[derive(Debug, Clone)]
pub struct EscalationRepo {
    pool: DbPool,
}

impl EscalationRepo {
    /// Create a new escalation repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an escalation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, item: &EscalationItem) -> Result<()> {
        let conn = super::conn(&self.pool)?;
        let classification = serde_json::to_string(&item.classification)?;
        conn.execute(
            r"INSERT INTO escalations (id, user_id, user_text, classification, suggested_reply, status, created_at_ms)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                item.id,
                item.user_id,
                item.user_text,
                classification,
                item.suggested_reply,
                item.status.as_str(),
                item.created_at_ms,
            ],
        )?;
        Ok(())
    }

    /// Fetch one escalation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<EscalationItem>> {
        let conn = super::conn(&self.pool)?;
        let result = conn.query_row(
            &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?1"),
            [id],
            row_to_escalation_row,
        );
        match result {
            Ok(row) => row.into_item().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List escalations newest first, optionally filtered by status
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, status: Option<EscalationStatus>, limit: usize) -> Result<Vec<EscalationItem>> {
        let conn = super::conn(&self.pool)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = if let Some(status) = status {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ESCALATION_COLUMNS} FROM escalations WHERE status = ?1 ORDER BY created_at_ms DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![status.as_str(), limit], row_to_escalation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ESCALATION_COLUMNS} FROM escalations ORDER BY created_at_ms DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], row_to_escalation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(EscalationRow::into_item).collect()
    }

    /// Number of open escalations
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_open(&self) -> Result<usize> {
        let conn = super::conn(&self.pool)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM escalations WHERE status = 'open'",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Mark an escalation resolved
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown, or a database error
    pub fn resolve(&self, id: &str, now_ms: i64) -> Result<()> {
        let conn = super::conn(&self.pool)?;
        let updated = conn.execute(
            "UPDATE escalations SET status = 'resolved', resolved_at_ms = ?2 WHERE id = ?1",
            rusqlite::params![id, now_ms],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("escalation {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl EscalationSink for EscalationRepo {
    async fn record(&self, item: &EscalationItem) -> Result<EscalationAck> {
        self.insert(item)
            .map_err(|e| Error::Escalation(e.to_string()))?;
        let queue_length = self
            .count_open()
            .map_err(|e| Error::Escalation(e.to_string()))?;

        tracing::info!(
            escalation_id = %item.id,
            user_id = %item.user_id,
            queue_length,
            "escalation recorded"
        );

        Ok(EscalationAck {
            id: item.id.clone(),
            queue_length,
        })
    }
}
