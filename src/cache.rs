//! A process-wide, mutex-guarded, bounded in-memory LRU cache.
//!
//! Not a disk cache — subtitle lookups and decoded subtitle text are cheap to regenerate
//! and only need to live for the process's lifetime. Keyed by opaque strings (the engine
//! uses `"subtitles_{series}_{season}"`-shaped keys), bounded both by item count and by
//! an estimated memory footprint.

use log::warn;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Implemented by every value type a [`Cache`] can hold, so eviction can reason about
/// memory pressure without knowing the concrete type.
pub trait EstimateSize {
    fn estimated_size(&self) -> usize;
}

impl EstimateSize for String {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl<T: EstimateSize> EstimateSize for Vec<T> {
    fn estimated_size(&self) -> usize {
        self.iter().map(EstimateSize::estimated_size).sum::<usize>() + 48
    }
}

struct Entry<T> {
    value: T,
    size: usize,
    last_access: Instant,
}

struct Inner<T> {
    entries: HashMap<String, Entry<T>>,
    current_memory: usize,
}

/// Bounded LRU. `get` refreshes recency; `set` bypasses caching entirely for any value
/// whose estimated size exceeds half of `max_memory_bytes`, then evicts the
/// least-recently-used entries until both the item-count and memory bounds hold.
pub struct Cache<T> {
    inner: Mutex<Inner<T>>,
    max_items: usize,
    max_memory_bytes: usize,
}

impl<T> Cache<T> {
    pub fn new(max_items: usize, max_memory_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                current_memory: 0,
            }),
            max_items,
            max_memory_bytes,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.current_memory = 0;
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Cache<T> {
    pub fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.value.clone())
    }
}

impl<T: EstimateSize> Cache<T> {
    pub fn set(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let size = value.estimated_size();
        let half_bound = self.max_memory_bytes / 2;

        if size > half_bound {
            warn!(
                "cache bypass for {key}: estimated {size} bytes exceeds 50% of the {} byte bound",
                self.max_memory_bytes
            );
            return;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inner.entries.remove(&key) {
            inner.current_memory -= previous.size;
        }
        inner.current_memory += size;
        inner.entries.insert(
            key,
            Entry {
                value,
                size,
                last_access: Instant::now(),
            },
        );

        self.evict(&mut inner);
    }

    fn evict(&self, inner: &mut Inner<T>) {
        while inner.entries.len() > self.max_items || inner.current_memory > self.max_memory_bytes
        {
            let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            if let Some(removed) = inner.entries.remove(&lru_key) {
                inner.current_memory -= removed.size;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_missing_key() {
        let cache: Cache<String> = Cache::new(10, 1024);
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = Cache::new(10, 1024);
        cache.set("key", "value".to_string());
        assert_eq!(cache.get("key"), Some("value".to_string()));
    }

    #[test]
    fn evicts_least_recently_used_when_over_item_cap() {
        let cache = Cache::new(2, 1024);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.get("a"); // refresh "a", making "b" the LRU
        cache.set("c", "3".to_string());

        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some("3".to_string()));
    }

    #[test]
    fn bypasses_caching_for_oversized_values() {
        let cache = Cache::new(10, 100);
        let huge = "x".repeat(80);
        cache.set("huge", huge);
        assert_eq!(cache.get("huge"), None);
    }

    #[test]
    fn evicts_on_memory_pressure_not_just_item_count() {
        let cache = Cache::new(100, 30);
        cache.set("a", "x".repeat(10));
        cache.set("b", "y".repeat(10));
        cache.set("c", "z".repeat(10));
        assert!(cache.len() <= 3);
        let total: usize = ["a", "b", "c"]
            .iter()
            .filter_map(|k| cache.get(k))
            .map(|v| v.len())
            .sum();
        assert!(total <= 30);
    }

    #[test]
    fn clear_resets_everything() {
        let cache = Cache::new(10, 1024);
        cache.set("a", "1".to_string());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
