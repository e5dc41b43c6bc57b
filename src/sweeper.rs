//! Retention sweeper
//!
//! The only component allowed to delete conversation memory. Also drops
//! expired dedupe records so the table does not grow without bound.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::Result;
use crate::clock::Clock;
use crate::db::ConversationRepo;
use crate::dedupe::DedupeStore;

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed_logs: usize,
    pub removed_dedupe: usize,
}

/// Deletes expired conversation entries and dedupe records
#[derive(Clone)]
pub struct RetentionSweeper {
    conversations: ConversationRepo,
    dedupe: Arc<dyn DedupeStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RetentionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionSweeper")
            .field("conversations", &self.conversations)
            .finish_non_exhaustive()
    }
}

impl RetentionSweeper {
    #[must_use]
    pub fn new(conversations: ConversationRepo, dedupe: Arc<dyn DedupeStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            conversations,
            dedupe,
            clock,
        }
    }

    /// Remove everything with `expires_at_ms <= now_ms`
    ///
    /// Idempotent: a second call at the same instant removes nothing.
    /// Entries with `expires_at_ms > now_ms` are never touched.
    ///
    /// # Errors
    ///
    /// Returns error if either store fails
    pub fn cleanup(&self, now_ms: i64) -> Result<CleanupReport> {
        let removed_logs = self.conversations.purge_expired(now_ms)?;
        let removed_dedupe = self.dedupe.purge_expired(now_ms)?;

        if removed_logs > 0 || removed_dedupe > 0 {
            tracing::info!(removed_logs, removed_dedupe, "retention sweep");
        } else {
            tracing::debug!("retention sweep found nothing to remove");
        }

        Ok(CleanupReport {
            removed_logs,
            removed_dedupe,
        })
    }

    /// Sweep at the current clock time
    ///
    /// # Errors
    ///
    /// Returns error if either store fails
    pub fn cleanup_now(&self) -> Result<CleanupReport> {
        self.cleanup(self.clock.now_ms())
    }

    /// Sweep every `every` in a background task
    #[must_use]
    pub fn spawn(self, every: Duration) -> tokio::task::JoinHandle<()> {
        tracing::info!(interval_secs = every.as_secs(), "retention sweeper started");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(e) = self.cleanup_now() {
                    tracing::warn!(error = %e, "retention sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::Action;
    use crate::classifier::Intent;
    use crate::clock::ManualClock;
    use crate::db::{self, NewConversationEntry, SqliteDedupe};

    const HOUR_MS: i64 = 3_600_000;

    fn setup() -> (ConversationRepo, Arc<SqliteDedupe>, RetentionSweeper, Arc<ManualClock>) {
        let pool = db::init_memory().unwrap();
        let conversations = ConversationRepo::new(pool.clone(), Duration::from_secs(3600));
        let dedupe = Arc::new(SqliteDedupe::new(pool, Duration::from_secs(60)));
        let clock = Arc::new(ManualClock::new(0));
        let sweeper = RetentionSweeper::new(conversations.clone(), dedupe.clone(), clock.clone());
        (conversations, dedupe, sweeper, clock)
    }

    fn turn(text: &str) -> NewConversationEntry {
        NewConversationEntry {
            user_id: "u1".to_string(),
            user_text: text.to_string(),
            assistant_text: String::new(),
            intent: Intent::General,
            confidence: 0.5,
            action: Action::Clarify,
        }
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let (conversations, dedupe, sweeper, _) = setup();
        conversations.append(&turn("old"), 0).unwrap();
        conversations.append(&turn("new"), HOUR_MS).unwrap();
        dedupe.seen_or_record("e1", 0).unwrap();

        let report = sweeper.cleanup(HOUR_MS).unwrap();
        assert_eq!(report, CleanupReport { removed_logs: 1, removed_dedupe: 1 });
        assert_eq!(conversations.count_for_user("u1").unwrap(), 1);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let (conversations, _, sweeper, _) = setup();
        conversations.append(&turn("a"), 0).unwrap();

        assert_eq!(sweeper.cleanup(2 * HOUR_MS).unwrap().removed_logs, 1);
        assert_eq!(sweeper.cleanup(2 * HOUR_MS).unwrap(), CleanupReport::default());
    }

    #[test]
    fn test_cleanup_now_uses_clock() {
        let (conversations, _, sweeper, clock) = setup();
        conversations.append(&turn("a"), 0).unwrap();

        assert_eq!(sweeper.cleanup_now().unwrap().removed_logs, 0);
        clock.set(HOUR_MS);
        assert_eq!(sweeper.cleanup_now().unwrap().removed_logs, 1);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_on_interval() {
        let (conversations, _, sweeper, clock) = setup();
        conversations.append(&turn("a"), 0).unwrap();
        clock.set(HOUR_MS);

        let handle = sweeper.spawn(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(conversations.count_for_user("u1").unwrap(), 0);
        handle.abort();
    }
}
