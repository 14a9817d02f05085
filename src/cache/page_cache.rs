//! Page cache - bounded map of resident pages.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use crate::cache::replacer::FifoReplacer;
use crate::cache::CacheStats;
use crate::common::PageRef;

/// Invoked with the victim right before it leaves the cache.
pub type EvictionCallback<V> = Box<dyn Fn(PageRef, &V) + Send + Sync>;

/// Bounded cache of resident pages keyed by [`PageRef`].
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────┐
/// │                      PageCache                       │
/// │  ┌─────────────────────┐   ┌──────────────────────┐  │
/// │  │ entries: RwLock     │   │ replacer: Mutex      │  │
/// │  │ PageRef → V         │   │ FifoReplacer<PageRef>│  │
/// │  └─────────────────────┘   └──────────────────────┘  │
/// │  stats: CacheStats (atomic)   on_evict: callback     │
/// └──────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `entries`: `RwLock`, shared for lookups, exclusive for insert and eviction
/// - `replacer`: `Mutex`, only taken while `entries` is write-locked
/// - `stats`: no lock, atomic counters
///
/// Entries are reclaimable: a lookup may miss at any time and callers must
/// re-resolve the page from its backing store. Loading happens outside the
/// cache; only the map mutation is done under the lock.
///
/// A capacity of zero disables caching altogether.
pub struct PageCache<V> {
    entries: RwLock<HashMap<PageRef, V>>,
    replacer: Mutex<FifoReplacer<PageRef>>,
    on_evict: Option<EvictionCallback<V>>,
    stats: CacheStats,
    capacity: usize,
}

impl<V: Clone> PageCache<V> {
    /// Create a cache holding at most `capacity` pages.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity.min(1024))),
            replacer: Mutex::new(FifoReplacer::new()),
            on_evict: None,
            stats: CacheStats::new(),
            capacity,
        }
    }

    /// Install the callback run before an entry is evicted.
    pub fn with_eviction_callback(mut self, callback: impl Fn(PageRef, &V) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Box::new(callback));
        self
    }

    /// Look a page up, counting the hit or miss.
    pub fn get(&self, page_ref: PageRef) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(&page_ref) {
            Some(value) => {
                self.stats.record_hit();
                Some(value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Admit a freshly loaded page, evicting the oldest ones if full.
    ///
    /// Returns the value that ends up associated with `page_ref`: if a
    /// concurrent reader admitted the same page first, its copy wins so
    /// every reader shares one instance.
    pub fn insert(&self, page_ref: PageRef, value: V) -> V {
        if self.capacity == 0 {
            return value;
        }

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&page_ref) {
            return existing.clone();
        }

        let mut replacer = self.replacer.lock();
        while entries.len() >= self.capacity {
            let Some(victim) = replacer.evict() else {
                break;
            };
            if let Some(evicted) = entries.get(&victim) {
                if let Some(callback) = &self.on_evict {
                    callback(victim, evicted);
                }
            }
            entries.remove(&victim);
            self.stats.record_eviction();
        }

        entries.insert(page_ref, value.clone());
        replacer.record_access(page_ref);
        value
    }

    /// Drop every resident page.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.replacer.lock().clear();
    }

    pub fn contains(&self, page_ref: PageRef) -> bool {
        self.entries.read().contains_key(&page_ref)
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn r(n: u64) -> PageRef {
        PageRef::new(n)
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let cache = PageCache::new(4);
        assert_eq!(cache.get(r(1)), None);

        cache.insert(r(1), "one");
        assert_eq!(cache.get(r(1)), Some("one"));

        let stats = cache.stats().snapshot();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let cache = PageCache::new(2);
        cache.insert(r(1), 1);
        cache.insert(r(2), 2);
        cache.insert(r(3), 3);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(r(1)));
        assert!(cache.contains(r(2)));
        assert!(cache.contains(r(3)));
        assert_eq!(cache.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_eviction_callback_sees_victim() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&evicted);
        let cache = PageCache::<u64>::new(1).with_eviction_callback(move |page_ref, value| {
            assert_eq!(page_ref, PageRef::new(*value));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.insert(r(7), 7);
        cache.insert(r(8), 8);
        cache.insert(r(9), 9);

        assert_eq!(evicted.load(Ordering::SeqCst), 2);
        assert!(cache.contains(r(9)));
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = PageCache::new(4);
        assert_eq!(cache.insert(r(1), "first"), "first");
        assert_eq!(cache.insert(r(1), "second"), "first");
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = PageCache::new(0);
        assert_eq!(cache.insert(r(1), 1), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get(r(1)), None);
    }

    #[test]
    fn test_clear() {
        let cache = PageCache::new(4);
        cache.insert(r(1), 1);
        cache.insert(r(2), 2);

        cache.clear();
        assert!(cache.is_empty());

        // Replacer was reset too: refilling evicts nothing
        cache.insert(r(3), 3);
        cache.insert(r(4), 4);
        cache.insert(r(5), 5);
        cache.insert(r(6), 6);
        assert_eq!(cache.stats().snapshot().evictions, 0);
    }
}
