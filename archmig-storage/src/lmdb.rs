//! LMDB-backed stores.
//!
//! Uses the heed crate (Rust bindings for LMDB). Every store is a single
//! unnamed database of raw byte keys and values inside its own environment
//! directory.
//!
//! # Roles
//!
//! - Sources are opened with the `READ_ONLY` environment flag and never write.
//! - Targets are opened with `NO_SYNC`; a durable commit forces a sync of the
//!   environment after the write transaction commits.
//!
//! # Compaction
//!
//! LMDB has no in-place compaction. `compact` writes a compacted copy of the
//! environment next to the live file and `close` swaps it in once the
//! environment is fully closed. A writable store closed without a pending
//! compaction removes any copy a failed run left behind.

use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use archmig_core::{KeyRange, StorageError};
use heed::types::Bytes;
use heed::{CompactionOption, Database, Env, EnvFlags, EnvOpenOptions};
use tracing::{debug, info};

use crate::traits::{Durability, SourceStore, StorageResult, TargetProvider, TargetStore, WriteBatch};

const DATA_FILE: &str = "data.mdb";
const COMPACTED_FILE: &str = "data.mdb.compacted";

pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
    read_only: bool,
    pending_compaction: Mutex<Option<PathBuf>>,
}

impl LmdbStore {
    /// Open an existing environment for reading only.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the directory is not an LMDB
    /// environment or holds no database.
    pub fn open_read_only<P: AsRef<Path>>(path: P, map_size: usize) -> StorageResult<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| StorageError::Open {
            path: path.display().to_string(),
            reason,
        };

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .flags(EnvFlags::READ_ONLY)
                .open(path)
        }
        .map_err(|e| open_err(e.to_string()))?;

        let rtxn = env.read_txn().map_err(|e| open_err(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .open_database(&rtxn, None)
            .map_err(|e| open_err(e.to_string()))?
            .ok_or_else(|| open_err("environment holds no database".to_string()))?;
        rtxn.commit().map_err(|e| open_err(e.to_string()))?;

        debug!(path = %path.display(), "opened source store read-only");
        Ok(Self {
            env,
            db,
            path: path.to_path_buf(),
            read_only: true,
            pending_compaction: Mutex::new(None),
        })
    }

    /// Open or create a writable environment, creating the directory first.
    pub fn create<P: AsRef<Path>>(path: P, map_size: usize) -> StorageResult<Self> {
        let path = path.as_ref();
        let open_err = |reason: String| StorageError::Open {
            path: path.display().to_string(),
            reason,
        };

        std::fs::create_dir_all(path).map_err(|e| open_err(e.to_string()))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .flags(EnvFlags::NO_SYNC)
                .open(path)
        }
        .map_err(|e| open_err(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(|e| open_err(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| open_err(e.to_string()))?;
        wtxn.commit().map_err(|e| open_err(e.to_string()))?;

        debug!(path = %path.display(), map_size, "opened target store");
        Ok(Self {
            env,
            db,
            path: path.to_path_buf(),
            read_only: false,
            pending_compaction: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of records in the store.
    pub fn entry_count(&self) -> StorageResult<u64> {
        let rtxn = self.env.read_txn().map_err(|e| StorageError::Read {
            reason: e.to_string(),
        })?;
        self.db.len(&rtxn).map_err(|e| StorageError::Read {
            reason: e.to_string(),
        })
    }

    fn read(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(|e| StorageError::Read {
            reason: e.to_string(),
        })?;
        let value = self.db.get(&rtxn, key).map_err(|e| StorageError::Read {
            reason: e.to_string(),
        })?;
        Ok(value.map(<[u8]>::to_vec))
    }
}

impl SourceStore for LmdbStore {
    fn scan<F, E>(&self, range: &KeyRange, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
        E: From<StorageError>,
    {
        if range.is_empty() {
            return Ok(());
        }
        let iter_err = |e: heed::Error| StorageError::Iteration {
            reason: e.to_string(),
        };

        let rtxn = self.env.read_txn().map_err(iter_err)?;
        let bounds = (
            Bound::Included(range.lower.as_slice()),
            Bound::Excluded(range.upper.as_slice()),
        );
        let iter = self.db.range(&rtxn, &bounds).map_err(iter_err)?;
        for entry in iter {
            let (key, value) = entry.map_err(iter_err)?;
            visit(key, value)?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.read(key)
    }
}

impl TargetStore for LmdbStore {
    fn commit(&self, batch: &WriteBatch, durability: Durability) -> StorageResult<()> {
        let commit_err = |reason: String| StorageError::Commit {
            staged: batch.len(),
            reason,
        };
        if self.read_only {
            return Err(commit_err("store is read-only".to_string()));
        }

        let mut wtxn = self.env.write_txn().map_err(|e| commit_err(e.to_string()))?;
        for (key, value) in batch.iter() {
            self.db
                .put(&mut wtxn, key, value)
                .map_err(|e| commit_err(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| commit_err(e.to_string()))?;

        if durability == Durability::Durable {
            self.env.force_sync().map_err(|e| commit_err(e.to_string()))?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.read(key)
    }

    /// LMDB compacts whole environments, so the range only shows up in logs.
    fn compact(&self, range: &KeyRange, full: bool) -> StorageResult<()> {
        let compaction_err = |reason: String| StorageError::Compaction { reason };
        let compacted = self.path.join(COMPACTED_FILE);
        if compacted.exists() {
            std::fs::remove_file(&compacted).map_err(|e| compaction_err(e.to_string()))?;
        }

        if let Err(e) = self.env.copy_to_file(&compacted, CompactionOption::Enabled) {
            // A partial copy must never be swapped in by a later close.
            if compacted.exists() {
                let _ = std::fs::remove_file(&compacted);
            }
            return Err(compaction_err(e.to_string()));
        }

        let mut pending = self
            .pending_compaction
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        *pending = Some(compacted);

        info!(
            path = %self.path.display(),
            lower = range.lower.first().copied().unwrap_or_default(),
            full,
            "wrote compacted copy, swapping in on close"
        );
        Ok(())
    }

    fn close(self) -> StorageResult<()> {
        let LmdbStore {
            env,
            db: _,
            path,
            read_only,
            pending_compaction,
        } = self;
        let pending = pending_compaction
            .into_inner()
            .map_err(|_| StorageError::LockPoisoned)?;

        env.prepare_for_closing().wait();

        match pending {
            Some(compacted) => {
                std::fs::rename(&compacted, path.join(DATA_FILE)).map_err(|e| {
                    StorageError::Close {
                        reason: format!("swapping in compacted copy: {}", e),
                    }
                })?;
                debug!(path = %path.display(), "compacted copy swapped in");
            }
            None if !read_only => {
                let stale = path.join(COMPACTED_FILE);
                if stale.exists() {
                    std::fs::remove_file(&stale).map_err(|e| StorageError::Close {
                        reason: format!("removing stale compacted copy: {}", e),
                    })?;
                    debug!(path = %path.display(), "stale compacted copy removed");
                }
            }
            None => {}
        }
        Ok(())
    }
}

/// Opens LMDB targets, one environment per epoch under a common root.
#[derive(Debug, Clone)]
pub struct LmdbTargets {
    root: PathBuf,
    map_size: usize,
}

impl LmdbTargets {
    pub fn new<P: Into<PathBuf>>(root: P, map_size: usize) -> Self {
        Self {
            root: root.into(),
            map_size,
        }
    }

    pub fn epoch_path(&self, epoch: u32) -> PathBuf {
        self.root.join(epoch.to_string())
    }
}

impl TargetProvider for LmdbTargets {
    type Store = LmdbStore;

    fn open_epoch(&self, epoch: u32) -> StorageResult<LmdbStore> {
        LmdbStore::create(self.epoch_path(epoch), self.map_size)
    }

    fn open_at(&self, path: &Path) -> StorageResult<LmdbStore> {
        LmdbStore::create(path, self.map_size)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archmig_core::keys::numeric_key;
    use archmig_core::Namespace;
    use tempfile::TempDir;

    const MAP_SIZE: usize = 16 * 1024 * 1024;

    fn write_ticks(store: &LmdbStore, ticks: std::ops::Range<u64>) {
        let mut batch = store.new_batch();
        for tick in ticks {
            batch.set(numeric_key(Namespace::TickData, tick), tick.to_be_bytes().to_vec());
        }
        store
            .commit(&batch, Durability::Durable)
            .expect("commit should succeed");
    }

    #[test]
    fn test_create_commit_and_get() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = LmdbStore::create(dir.path(), MAP_SIZE).expect("create should succeed");
        write_ticks(&store, 0..5);

        let value = TargetStore::get(&store, &numeric_key(Namespace::TickData, 3))
            .expect("get should succeed");
        assert_eq!(value, Some(3u64.to_be_bytes().to_vec()));
        assert_eq!(store.entry_count().expect("count should succeed"), 5);
        store.close().expect("close should succeed");
    }

    #[test]
    fn test_read_only_scan_after_reopen() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = LmdbStore::create(dir.path(), MAP_SIZE).expect("create should succeed");
        write_ticks(&store, 0..20);
        store.close().expect("close should succeed");

        let source = LmdbStore::open_read_only(dir.path(), MAP_SIZE).expect("open should succeed");
        assert!(source.is_read_only());

        let range = KeyRange::new(
            numeric_key(Namespace::TickData, 5),
            numeric_key(Namespace::TickData, 10),
        );
        let mut seen = Vec::new();
        source
            .scan(&range, |key, _| {
                seen.push(key.to_vec());
                Ok::<(), StorageError>(())
            })
            .expect("scan should succeed");
        let expected: Vec<Vec<u8>> = (5..10).map(|t| numeric_key(Namespace::TickData, t)).collect();
        assert_eq!(seen, expected);

        let err = source
            .commit(&WriteBatch::new(), Durability::Durable)
            .expect_err("read-only commit should fail");
        assert!(matches!(err, StorageError::Commit { .. }));
        source.close().expect("close should succeed");
    }

    #[test]
    fn test_open_read_only_missing_dir_fails() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let result = LmdbStore::open_read_only(dir.path().join("absent"), MAP_SIZE);
        assert!(matches!(result, Err(StorageError::Open { .. })));
    }

    #[test]
    fn test_compaction_swaps_on_close() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = LmdbStore::create(dir.path(), MAP_SIZE).expect("create should succeed");
        write_ticks(&store, 0..100);
        store
            .compact(&KeyRange::new(vec![0x00], vec![0xFF]), true)
            .expect("compact should succeed");
        assert!(dir.path().join(COMPACTED_FILE).exists());
        store.close().expect("close should succeed");

        assert!(!dir.path().join(COMPACTED_FILE).exists());
        let reopened = LmdbStore::open_read_only(dir.path(), MAP_SIZE).expect("open should succeed");
        assert_eq!(reopened.entry_count().expect("count should succeed"), 100);
        reopened.close().expect("close should succeed");
    }

    #[test]
    fn test_close_removes_stale_compacted_copy() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = LmdbStore::create(dir.path(), MAP_SIZE).expect("create should succeed");
        write_ticks(&store, 0..10);
        std::fs::write(dir.path().join(COMPACTED_FILE), b"partial").expect("write should succeed");
        store.close().expect("close should succeed");

        assert!(!dir.path().join(COMPACTED_FILE).exists());
        let reopened = LmdbStore::open_read_only(dir.path(), MAP_SIZE).expect("open should succeed");
        assert_eq!(reopened.entry_count().expect("count should succeed"), 10);
        reopened.close().expect("close should succeed");
    }

    #[test]
    fn test_targets_open_per_epoch_directory() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let targets = LmdbTargets::new(dir.path(), MAP_SIZE);
        let store = targets.open_epoch(150).expect("open should succeed");
        assert_eq!(store.path(), dir.path().join("150"));
        store.close().expect("close should succeed");
        assert!(dir.path().join("150").join(DATA_FILE).exists());
    }
}
