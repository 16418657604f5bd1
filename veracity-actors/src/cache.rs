//! Bounded, time-expiring result store.
//!
//! Expiry is lazy: an entry older than the TTL is removed when it is read, and
//! there is no background sweep. When full, `put` evicts the entry that was
//! inserted first (insertion order, not LRU).
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<String>,
}

pub struct ResultCache<V> {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> ResultCache<V> {
    /// `capacity` is clamped to at least one entry.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // Every critical section leaves the maps consistent, so a poisoned
        // lock is still safe to reuse.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let fresh = match inner.entries.get(key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() < self.ttl,
        };
        if fresh {
            return inner.entries.get(key).map(|e| e.value.clone());
        }
        inner.entries.remove(key);
        inner.order.retain(|k| k != key);
        tracing::trace!(key, "cache.expired");
        None
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut inner = self.lock();
        let now = Instant::now();
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.stored_at = now;
            return;
        }
        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                tracing::trace!(key = %oldest, "cache.evicted");
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    /// Live and not-yet-collected expired entries alike.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cache key for free text: trimmed, lowercased and cut to `max_len` characters.
///
/// Two long texts sharing a normalized prefix map to the same key and share a
/// slot.
///
/// ```
/// use veracity_actors::cache::fingerprint;
///
/// assert_eq!(fingerprint("  Breaking NEWS  ", 500), "breaking news");
/// assert_eq!(fingerprint("Ünïcode text", 3), "ünï");
/// ```
pub fn fingerprint(text: &str, max_len: usize) -> String {
    text.trim().to_lowercase().chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_on_read() {
        let cache = ResultCache::new(Duration::from_secs(300), 10);
        cache.put("a", 1);
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("a"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.len(), 1, "expiry is lazy");
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn oldest_inserted_is_evicted_first() {
        let cache = ResultCache::new(Duration::from_secs(300), 3);
        for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
            cache.put(key, i);
        }
        // Reading does not refresh position.
        assert_eq!(cache.get("a"), Some(0));
        cache.put("d", 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(1));
        assert_eq!(cache.get("d"), Some(3));
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn overwrite_keeps_position_without_evicting() {
        let cache = ResultCache::new(Duration::from_secs(300), 2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));

        cache.put("c", 3);
        assert_eq!(cache.get("a"), None, "a is still the oldest insertion");
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_timestamp() {
        let cache = ResultCache::new(Duration::from_secs(10), 2);
        cache.put("a", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put("a", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a"), Some(2));
    }

    #[tokio::test]
    async fn clear_empties() {
        let cache = ResultCache::new(Duration::from_secs(1), 4);
        cache.put("x", ());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn fingerprint_collides_on_shared_prefix() {
        let a = format!("{}tail one", "x".repeat(500));
        let b = format!("{}TAIL TWO", "X".repeat(500));
        assert_eq!(fingerprint(&a, 500), fingerprint(&b, 500));
    }
}
