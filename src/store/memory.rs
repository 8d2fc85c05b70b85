use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{KeyExpiry, MarkerState};

/// In-process backend for [`CounterStore`](super::CounterStore).
///
/// Expiry is lazy: a dead entry is treated as missing on read and is
/// reset in place on the next increment. [`MemoryStore::purge_expired`]
/// exists for long-running processes that want to reclaim the map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoreEntry>>,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: i64,
    /// Absolute deadline in epoch milliseconds, `None` for entries that
    /// never expire.
    deadline_ms: Option<i64>,
}

impl StoreEntry {
    fn fresh(value: i64, expiry: KeyExpiry, now_ms: i64) -> Self {
        let deadline_ms = match expiry {
            KeyExpiry::After(window) => Some(now_ms + window.as_millis() as i64),
            KeyExpiry::AtMillis(deadline_ms) => Some(deadline_ms),
            KeyExpiry::Never => None,
        };
        StoreEntry { value, deadline_ms }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if deadline <= now_ms)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Increment under the shard lock so concurrent callers never lose an
    /// update, and the expiry is assigned exactly once per key lifetime.
    pub(crate) fn increment(&self, key: &str, expiry: KeyExpiry) -> i64 {
        let now_ms = Self::now_ms();
        let mut slot = self
            .entries
            .entry(key.to_owned())
            .and_modify(|entry| {
                if entry.is_expired(now_ms) {
                    *entry = StoreEntry::fresh(0, expiry, now_ms);
                }
            })
            .or_insert_with(|| StoreEntry::fresh(0, expiry, now_ms));
        slot.value += 1;
        slot.value
    }

    pub(crate) fn count(&self, key: &str) -> i64 {
        let now_ms = Self::now_ms();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => entry.value,
            _ => 0,
        }
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        let now_ms = Self::now_ms();
        matches!(self.entries.get(key), Some(entry) if !entry.is_expired(now_ms))
    }

    pub(crate) fn set_marker(&self, key: &str, expiry: KeyExpiry) {
        let now_ms = Self::now_ms();
        self.entries
            .insert(key.to_owned(), StoreEntry::fresh(1, expiry, now_ms));
    }

    pub(crate) fn marker_ttl(&self, key: &str) -> MarkerState {
        let now_ms = Self::now_ms();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => match entry.deadline_ms {
                Some(deadline) => MarkerState::Expires(Duration::from_millis(
                    (deadline - now_ms) as u64,
                )),
                None => MarkerState::Permanent,
            },
            _ => MarkerState::Absent,
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every expired entry. Lazy expiry already keeps reads correct;
    /// this only reclaims memory.
    pub fn purge_expired(&self) {
        let now_ms = Self::now_ms();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_increment_counts_up_from_one() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("k", KeyExpiry::Never), 1);
        assert_eq!(store.increment("k", KeyExpiry::Never), 2);
        assert_eq!(store.count("k"), 2);
    }

    #[test]
    fn test_expired_entry_reads_as_missing() {
        let store = MemoryStore::new();
        // A deadline in the past expires the entry immediately.
        store.set_marker("gone", KeyExpiry::AtMillis(MemoryStore::now_ms() - 1));

        assert!(!store.exists("gone"));
        assert_eq!(store.count("gone"), 0);
        assert_eq!(store.marker_ttl("gone"), MarkerState::Absent);
    }

    #[test]
    fn test_marker_ttl_distinguishes_permanent_from_bounded() {
        let store = MemoryStore::new();

        store.set_marker("forever", KeyExpiry::Never);
        assert_eq!(store.marker_ttl("forever"), MarkerState::Permanent);

        store.set_marker("bounded", KeyExpiry::After(Duration::from_secs(10)));
        match store.marker_ttl("bounded") {
            MarkerState::Expires(left) => {
                assert!(left <= Duration::from_secs(10));
                assert!(left > Duration::from_secs(8));
            }
            other => panic!("expected bounded marker, got {:?}", other),
        }
    }

    #[test]
    fn test_deadline_is_not_refreshed_by_later_increments() {
        let store = MemoryStore::new();
        let window = KeyExpiry::After(Duration::from_secs(5));

        store.increment("k", window);
        let first = match store.marker_ttl("k") {
            MarkerState::Expires(left) => left,
            other => panic!("expected bounded counter, got {:?}", other),
        };

        std::thread::sleep(Duration::from_millis(120));
        for _ in 0..10 {
            store.increment("k", window);
        }

        let second = match store.marker_ttl("k") {
            MarkerState::Expires(left) => left,
            other => panic!("expected bounded counter, got {:?}", other),
        };
        // Had any increment reinstalled the expiry, the remaining lifetime
        // would have grown back toward the full window.
        assert!(second < first);
    }

    #[test]
    fn test_purge_drops_only_expired_entries() {
        let store = MemoryStore::new();
        store.set_marker("dead", KeyExpiry::AtMillis(MemoryStore::now_ms() - 1));
        store.set_marker("alive", KeyExpiry::After(Duration::from_secs(60)));
        assert_eq!(store.len(), 2);

        store.purge_expired();

        assert_eq!(store.len(), 1);
        assert!(store.exists("alive"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_nothing() {
        let store = MemoryStore::new();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        store.increment("shared", KeyExpiry::After(Duration::from_secs(60)));
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.count("shared"), 400);
    }
}
