//! Store contracts.
//!
//! The migration pipeline only needs ordered range iteration over the source,
//! atomic batch writes into the target and point reads on both. Anything that
//! provides those over byte-string keys can act as a store.

use std::path::Path;

use archmig_core::{KeyRange, StorageError};

pub type StorageResult<T> = Result<T, StorageError>;

/// Whether a commit must reach disk before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Flush to stable storage before the commit returns.
    Durable,
    /// The engine may defer the flush.
    Relaxed,
}

/// Read side of a migration: the v1 archive.
pub trait SourceStore {
    /// Visit every pair with `range.lower <= key < range.upper` in ascending
    /// key order. The visitor's error aborts the scan and is returned as is.
    fn scan<F, E>(&self, range: &KeyRange, visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
        E: From<StorageError>;

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;
}

/// Write side of a migration: one v2 store.
pub trait TargetStore {
    fn new_batch(&self) -> WriteBatch {
        WriteBatch::new()
    }

    /// Apply every staged pair atomically. The batch is left untouched; the
    /// caller resets it.
    fn commit(&self, batch: &WriteBatch, durability: Durability) -> StorageResult<()>;

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Reclaim space over `range`; `full` asks for a complete rewrite where the
    /// engine distinguishes.
    fn compact(&self, range: &KeyRange, full: bool) -> StorageResult<()>;

    fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}

/// Opens target stores: one per epoch, or one at an explicit location.
pub trait TargetProvider {
    type Store: TargetStore;

    fn open_epoch(&self, epoch: u32) -> StorageResult<Self::Store>;

    fn open_at(&self, path: &Path) -> StorageResult<Self::Store>;
}

/// Records staged for one atomic commit.
///
/// Later writes to the same key win when the batch is applied, matching the
/// engine's overwrite-by-key semantics.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    staged_bytes: usize,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged_bytes += key.len() + value.len();
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn staged_bytes(&self) -> usize {
        self.staged_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Drop every staged pair and release the buffers backing them.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
        self.staged_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_tracks_len_and_bytes() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.set(vec![1, 2], vec![3, 4, 5]);
        batch.set(vec![6], vec![]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.staged_bytes(), 6);

        let keys: Vec<&[u8]> = batch.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&[1u8, 2][..], &[6u8][..]]);
    }

    #[test]
    fn test_write_batch_reset_releases_buffers() {
        let mut batch = WriteBatch::new();
        for i in 0..100u8 {
            batch.set(vec![i], vec![i; 16]);
        }
        batch.reset();
        assert!(batch.is_empty());
        assert_eq!(batch.staged_bytes(), 0);
        assert_eq!(batch.entries.capacity(), 0);
    }
}
