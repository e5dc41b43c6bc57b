//! Webhook event deduplication
//!
//! Guarantees at-most-once processing of an event id within the TTL
//! window. The check and the insert happen in one atomic step so two
//! concurrent deliveries of the same id cannot both proceed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::{Error, Result};

/// Soft cap before expired entries are evicted
const DEDUP_SOFT_CAP: usize = 2000;

/// Store of processed event ids
pub trait DedupeStore: Send + Sync {
    /// Atomically check and record an event id
    ///
    /// Returns `true` if this is a duplicate (recorded and unexpired).
    /// Returns `false` on first sight and records the id.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage fails; callers must not
    /// process the event in that case
    fn seen_or_record(&self, event_id: &str, now_ms: i64) -> Result<bool>;

    /// Drop records with `expires_at_ms <= now_ms`, returning how many
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage fails
    fn purge_expired(&self, now_ms: i64) -> Result<usize>;
}

/// Convert a TTL into milliseconds, saturating
pub(crate) fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// In-process deduplication cache
///
/// Suitable for a single process. Entries are evicted only once expired,
/// never to make room, so the TTL guarantee holds under load.
#[derive(Debug)]
pub struct MemoryDedupe {
    /// Event id to expiry time
    cache: Mutex<HashMap<String, i64>>,
    ttl_ms: i64,
    soft_cap: usize,
}

impl MemoryDedupe {
    /// Create a cache remembering ids for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl_ms: ttl_ms(ttl),
            soft_cap: DEDUP_SOFT_CAP,
        }
    }

    /// Number of ids currently held, expired or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }

    /// Whether the cache holds no ids
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DedupeStore for MemoryDedupe {
    fn seen_or_record(&self, event_id: &str, now_ms: i64) -> Result<bool> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Database("dedupe cache lock poisoned".to_string()))?;

        // Evict expired entries periodically (when at capacity)
        if cache.len() >= self.soft_cap {
            cache.retain(|_, expires_at| *expires_at > now_ms);
        }

        if let Some(expires_at) = cache.get(event_id) {
            if *expires_at > now_ms {
                return Ok(true);
            }
        }

        cache.insert(event_id.to_string(), now_ms.saturating_add(self.ttl_ms));
        Ok(false)
    }

    fn purge_expired(&self, now_ms: i64) -> Result<usize> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Database("dedupe cache lock poisoned".to_string()))?;
        let before = cache.len();
        cache.retain(|_, expires_at| *expires_at > now_ms);
        Ok(before - cache.len())
    }
}
