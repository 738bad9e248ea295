//! Time-bounded in-memory cache for completed job results
//!
//! Remote mockup and generation jobs have a real monetary cost, so completed
//! results are cached by [`JobKey`] for a fixed TTL. Expiry is lazy: stale
//! entries are treated as misses and evicted on the next lookup, with no
//! background sweep. The cache lives as long as the hosting process.

use crate::types::JobKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<R> {
    value: R,
    stored_at: Instant,
}

/// TTL cache mapping [`JobKey`] to a completed job result
///
/// Thread-safe behind an internal mutex; lookups and inserts are cheap
/// in-memory operations, so the lock is never held across an await point.
pub struct ResultCache<R> {
    ttl: Duration,
    entries: Mutex<HashMap<JobKey, CacheEntry<R>>>,
}

impl<R: Clone> ResultCache<R> {
    /// Create a cache with the given time-to-live
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh result, evicting the entry if it has expired
    pub fn get(&self, key: &JobKey) -> Option<R> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                debug!("Cache entry for job {} expired; evicting", key);
                entries.remove(key);
                None
            },
            None => None,
        }
    }

    /// Store a completed result under its job key
    pub fn insert(&self, key: JobKey, value: R) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    /// Number of entries currently held, including not-yet-evicted stale ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured time-to-live
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<R> std::fmt::Debug for ResultCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field(
                "entries",
                &self.entries.lock().map_or(0, |entries| entries.len()),
            )
            .finish()
    }
}
