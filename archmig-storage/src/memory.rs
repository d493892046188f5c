//! In-memory store for tests and dry runs.
//!
//! A sorted map behind a shared lock. Clones share the same map, so a test can
//! hand one clone to the migrator and inspect another afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use archmig_core::{KeyRange, StorageError};

use crate::traits::{Durability, SourceStore, StorageResult, TargetProvider, TargetStore, WriteBatch};

#[derive(Debug, Default)]
struct Counters {
    commits: AtomicU64,
    durable_commits: AtomicU64,
    compactions: AtomicU64,
    closes: AtomicU64,
    /// Commits allowed before every further commit fails; 0 means unlimited.
    commit_limit: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single pair outside of any batch.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write().map_err(|_| StorageError::LockPoisoned)?;
        data.insert(key, value);
        Ok(())
    }

    /// Number of stored pairs. A poisoned lock still reports the map as
    /// the panicking writer left it.
    pub fn len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every pair in key order.
    pub fn snapshot(&self) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Number of keys inside `range`.
    pub fn count_range(&self, range: &KeyRange) -> StorageResult<usize> {
        if range.is_empty() {
            return Ok(0);
        }
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data
            .range::<[u8], _>((
                std::ops::Bound::Included(range.lower.as_slice()),
                std::ops::Bound::Excluded(range.upper.as_slice()),
            ))
            .count())
    }

    pub fn commit_count(&self) -> u64 {
        self.counters.commits.load(Ordering::Relaxed)
    }

    pub fn durable_commit_count(&self) -> u64 {
        self.counters.durable_commits.load(Ordering::Relaxed)
    }

    pub fn compaction_count(&self) -> u64 {
        self.counters.compactions.load(Ordering::Relaxed)
    }

    /// Times a handle to this store was closed.
    pub fn close_count(&self) -> u64 {
        self.counters.closes.load(Ordering::Relaxed)
    }

    /// Make every commit after the first `commits` fail.
    pub fn fail_commits_after(&self, commits: u64) {
        self.counters
            .commit_limit
            .store(commits.saturating_add(1), Ordering::Relaxed);
    }

    fn collect_range(&self, range: &KeyRange) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data
            .range::<[u8], _>((
                std::ops::Bound::Included(range.lower.as_slice()),
                std::ops::Bound::Excluded(range.upper.as_slice()),
            ))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

impl SourceStore for MemoryStore {
    fn scan<F, E>(&self, range: &KeyRange, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
        E: From<StorageError>,
    {
        // Copy out first so the visitor never runs under the lock.
        let pairs = self.collect_range(range)?;
        for (key, value) in &pairs {
            visit(key, value)?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(data.get(key).cloned())
    }
}

impl TargetStore for MemoryStore {
    fn commit(&self, batch: &WriteBatch, durability: Durability) -> StorageResult<()> {
        let limit = self.counters.commit_limit.load(Ordering::Relaxed);
        let attempted = self.counters.commits.load(Ordering::Relaxed) + 1;
        if limit != 0 && attempted >= limit {
            return Err(StorageError::Commit {
                staged: batch.len(),
                reason: "commit limit reached".to_string(),
            });
        }

        let mut data = self.data.write().map_err(|_| StorageError::LockPoisoned)?;
        for (key, value) in batch.iter() {
            data.insert(key.to_vec(), value.to_vec());
        }
        self.counters.commits.fetch_add(1, Ordering::Relaxed);
        if durability == Durability::Durable {
            self.counters.durable_commits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        SourceStore::get(self, key)
    }

    fn compact(&self, _range: &KeyRange, _full: bool) -> StorageResult<()> {
        self.counters.compactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(self) -> StorageResult<()> {
        self.counters.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Hands out one shared [`MemoryStore`] per epoch.
#[derive(Debug, Clone, Default)]
pub struct MemoryTargets {
    epochs: Arc<RwLock<BTreeMap<u32, MemoryStore>>>,
    paths: Arc<RwLock<BTreeMap<String, MemoryStore>>>,
}

impl MemoryTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for `epoch`, if it was ever opened.
    pub fn epoch(&self, epoch: u32) -> Option<MemoryStore> {
        self.epochs.read().ok()?.get(&epoch).cloned()
    }

    pub fn at(&self, path: &Path) -> Option<MemoryStore> {
        self.paths.read().ok()?.get(&path.display().to_string()).cloned()
    }

    pub fn opened_epochs(&self) -> Vec<u32> {
        self.epochs
            .read()
            .map(|e| e.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl TargetProvider for MemoryTargets {
    type Store = MemoryStore;

    fn open_epoch(&self, epoch: u32) -> StorageResult<MemoryStore> {
        let mut epochs = self.epochs.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(epochs.entry(epoch).or_default().clone())
    }

    fn open_at(&self, path: &Path) -> StorageResult<MemoryStore> {
        let mut paths = self.paths.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(paths.entry(path.display().to_string()).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archmig_core::keys::numeric_key;
    use archmig_core::Namespace;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for tick in 0..10u64 {
            store
                .put(numeric_key(Namespace::TickData, tick), vec![tick as u8])
                .expect("put should succeed");
            store
                .put(numeric_key(Namespace::QuorumData, tick), vec![0xAA])
                .expect("put should succeed");
        }
        store
    }

    #[test]
    fn test_scan_visits_range_in_order() {
        let store = seeded();
        let range = KeyRange::namespace(Namespace::TickData);
        let mut seen = Vec::new();
        store
            .scan(&range, |_, v| {
                seen.push(v[0]);
                Ok::<(), StorageError>(())
            })
            .expect("scan should succeed");
        assert_eq!(seen, (0..10u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_stops_on_visitor_error() {
        let store = seeded();
        let range = KeyRange::namespace(Namespace::TickData);
        let mut visited = 0;
        let result = store.scan(&range, |_, _| {
            visited += 1;
            if visited == 3 {
                Err(StorageError::Iteration {
                    reason: "stop".to_string(),
                })
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_commit_applies_batch_and_counts() {
        let store = MemoryStore::new();
        let mut batch = store.new_batch();
        batch.set(vec![1], vec![1]);
        batch.set(vec![1], vec![2]);
        store
            .commit(&batch, Durability::Durable)
            .expect("commit should succeed");
        assert_eq!(TargetStore::get(&store, &[1]).expect("get should succeed"), Some(vec![2]));
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.durable_commit_count(), 1);
    }

    #[test]
    fn test_fail_commits_after_limit() {
        let store = MemoryStore::new();
        store.fail_commits_after(1);
        let mut batch = store.new_batch();
        batch.set(vec![1], vec![1]);
        store
            .commit(&batch, Durability::Durable)
            .expect("first commit should succeed");
        let err = store
            .commit(&batch, Durability::Durable)
            .expect_err("second commit should fail");
        assert!(matches!(err, StorageError::Commit { staged: 1, .. }));
    }

    #[test]
    fn test_targets_share_store_per_epoch() {
        let targets = MemoryTargets::new();
        let first = targets.open_epoch(7).expect("open should succeed");
        first.put(vec![9], vec![9]).expect("put should succeed");
        let again = targets.open_epoch(7).expect("open should succeed");
        assert_eq!(again.len(), 1);
        assert_eq!(targets.opened_epochs(), vec![7]);
        assert!(targets.epoch(8).is_none());
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let store = seeded();
        let shared = store.clone();
        let result = std::thread::spawn(move || {
            let _guard = shared.data.write().expect("lock should succeed");
            panic!("writer panics while holding the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(store.data.is_poisoned());

        assert_eq!(store.len(), 20);
        assert!(!store.is_empty());
        assert!(matches!(store.snapshot(), Err(StorageError::LockPoisoned)));
    }

    #[test]
    fn test_count_range() {
        let store = seeded();
        let range = KeyRange::namespace(Namespace::QuorumData);
        assert_eq!(store.count_range(&range).expect("count should succeed"), 10);
    }
}
