//! Bounded keyed store for processed datasets
//!
//! Uploaded datasets live here between requests. Entries expire after a TTL and the
//! least recently used entry is evicted once the store is at capacity.

use crate::data::ProcessedDataset;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// A stored dataset with bookkeeping
#[derive(Debug, Clone)]
struct StoreEntry {
    value: Arc<ProcessedDataset>,
    created_at: Instant,
    /// Logical clock value of the latest access
    last_used: u64,
}

impl StoreEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe dataset store with TTL expiry and LRU eviction
pub struct DatasetStore {
    capacity: usize,
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, StoreEntry>>,
    clock: AtomicU64,
    stats: RwLock<StoreStats>,
}

impl DatasetStore {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        Self::with_ttl(capacity, Duration::from_secs(ttl_seconds))
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ttl,
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            clock: AtomicU64::new(0),
            stats: RwLock::new(StoreStats::default()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Store a dataset under a fresh id, evicting the least recently used entry if full
    pub fn insert(&self, dataset: ProcessedDataset) -> Uuid {
        let id = Uuid::new_v4();
        let entry = StoreEntry {
            value: Arc::new(dataset),
            created_at: Instant::now(),
            last_used: self.tick(),
        };

        let mut entries = self.entries.write();
        entries.retain(|_, e| !e.is_expired(self.ttl));

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            if let Some(key) = oldest {
                entries.remove(&key);
                self.stats.write().evictions += 1;
                debug!(id = %key, "Evicted least recently used dataset");
            }
        }

        entries.insert(id, entry);
        id
    }

    /// Fetch a dataset, refreshing its recency; expired entries are dropped
    pub fn get(&self, id: &Uuid) -> Option<Arc<ProcessedDataset>> {
        let mut entries = self.entries.write();

        let expired = match entries.get(id) {
            Some(entry) => entry.is_expired(self.ttl),
            None => {
                self.stats.write().misses += 1;
                return None;
            }
        };

        if expired {
            entries.remove(id);
            self.stats.write().misses += 1;
            debug!(id = %id, "Dataset expired");
            return None;
        }

        let tick = self.tick();
        let entry = entries.get_mut(id)?;
        entry.last_used = tick;
        self.stats.write().hits += 1;
        Some(Arc::clone(&entry.value))
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<ProcessedDataset>> {
        self.entries.write().remove(id).map(|e| e.value)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries
            .read()
            .get(id)
            .map_or(false, |e| !e.is_expired(self.ttl))
    }

    /// Drop every expired entry, returning how many were removed
    pub fn prune_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(self.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> StoreStats {
        *self.stats.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataColumn, DataProcessor, Dataset};
    use std::thread;

    fn processed(n: i64) -> ProcessedDataset {
        let ds = Dataset::new(vec![DataColumn::integer("n", vec![Some(n)])]).unwrap();
        DataProcessor::new().process(ds).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = DatasetStore::new(4, 60);
        let id = store.insert(processed(1));

        let ds = store.get(&id).unwrap();
        assert_eq!(ds.dataset.n_rows(), 1);
        assert!(store.get(&Uuid::new_v4()).is_none());

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_lru_eviction() {
        let store = DatasetStore::new(3, 60);
        let a = store.insert(processed(1));
        let b = store.insert(processed(2));
        let c = store.insert(processed(3));

        // Touch "a" so "b" becomes least recently used
        store.get(&a);
        let d = store.insert(processed(4));

        assert_eq!(store.len(), 3);
        assert!(store.contains(&a));
        assert!(!store.contains(&b));
        assert!(store.contains(&c));
        assert!(store.contains(&d));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_ttl_expiration() {
        let store = DatasetStore::with_ttl(10, Duration::from_millis(50));
        let a = store.insert(processed(1));
        store.insert(processed(2));
        assert!(store.get(&a).is_some());

        thread::sleep(Duration::from_millis(120));

        assert!(store.get(&a).is_none());
        assert_eq!(store.prune_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove() {
        let store = DatasetStore::new(2, 60);
        let id = store.insert(processed(1));
        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }
}
