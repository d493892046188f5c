//! Memory-bounded batch writing.
//!
//! Records are staged into one open batch. When the staged count reaches the
//! limit the batch is committed, reset and its buffers released before staging
//! continues, so peak memory is bounded by the limit and not by the range size.

use std::ops::AddAssign;

use archmig_core::{ArchmigResult, ResultExt, RunError};
use archmig_core::config::DEFAULT_BATCH_SIZE;
use archmig_storage::{Durability, TargetStore, WriteBatch};
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancellationToken;

/// How a transcoding pass writes.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Staged records per commit. Values below 1 are treated as 1.
    pub batch_limit: usize,
    pub durability: Durability,
    pub cancel: CancellationToken,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_SIZE,
            durability: Durability::Durable,
            cancel: CancellationToken::new(),
        }
    }
}

impl TranscodeOptions {
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Counters for one transcoding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeStats {
    /// Source records visited.
    pub scanned: u64,
    /// Records committed to the target.
    pub written: u64,
    /// Commits issued.
    pub flushes: u64,
}

impl AddAssign for TranscodeStats {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.written += other.written;
        self.flushes += other.flushes;
    }
}

/// Stages records for one target and commits them in bounded batches.
pub struct BatchWriter<'t, T: TargetStore> {
    target: &'t T,
    batch: WriteBatch,
    options: TranscodeOptions,
    label: &'static str,
    stats: TranscodeStats,
}

impl<'t, T: TargetStore> BatchWriter<'t, T> {
    /// `label` names the record stream in logs and error context.
    pub fn new(target: &'t T, options: &TranscodeOptions, label: &'static str) -> Self {
        Self {
            target,
            batch: target.new_batch(),
            options: options.clone(),
            label,
            stats: TranscodeStats::default(),
        }
    }

    pub fn staged(&self) -> usize {
        self.batch.len()
    }

    /// Stage one record, flushing first if the limit has been reached.
    ///
    /// # Errors
    ///
    /// Fails if the flush fails, or with [`RunError::Cancelled`] when the
    /// token was cancelled; in that case the flush has already committed.
    pub fn stage(&mut self, key: Vec<u8>, value: Vec<u8>) -> ArchmigResult<()> {
        self.batch.set(key, value);
        if self.batch.len() >= self.options.batch_limit.max(1) {
            self.flush()?;
            if self.options.cancel.is_cancelled() {
                return Err(RunError::Cancelled {
                    committed: self.stats.written,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Commit whatever is staged. A no-op on an empty batch.
    pub fn flush(&mut self) -> ArchmigResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let staged = self.batch.len();
        self.target
            .commit(&self.batch, self.options.durability)
            .with_context(|| format!("committing {} batch", self.label))?;
        self.batch.reset();

        self.stats.written += staged as u64;
        self.stats.flushes += 1;
        debug!(
            stream = self.label,
            staged,
            written = self.stats.written,
            flushes = self.stats.flushes,
            "flushed batch"
        );
        Ok(())
    }

    /// Commit the partial batch and return the counters.
    pub fn finish(mut self) -> ArchmigResult<TranscodeStats> {
        self.flush()?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archmig_storage::MemoryStore;

    #[test]
    fn test_flushes_at_limit_and_on_finish() {
        let target = MemoryStore::new();
        let options = TranscodeOptions::default().with_batch_limit(3);
        let mut writer = BatchWriter::new(&target, &options, "test");
        for i in 0..7u8 {
            writer.stage(vec![i], vec![i]).expect("stage should succeed");
        }
        assert_eq!(writer.staged(), 1);
        let stats = writer.finish().expect("finish should succeed");
        assert_eq!(stats.written, 7);
        assert_eq!(stats.flushes, 3);
        assert_eq!(target.len(), 7);
        assert_eq!(target.durable_commit_count(), 3);
    }

    #[test]
    fn test_finish_on_empty_writer_does_not_commit() {
        let target = MemoryStore::new();
        let writer = BatchWriter::new(&target, &TranscodeOptions::default(), "test");
        let stats = writer.finish().expect("finish should succeed");
        assert_eq!(stats, TranscodeStats::default());
        assert_eq!(target.commit_count(), 0);
    }

    #[test]
    fn test_zero_limit_behaves_like_one() {
        let target = MemoryStore::new();
        let options = TranscodeOptions::default().with_batch_limit(0);
        let mut writer = BatchWriter::new(&target, &options, "test");
        writer.stage(vec![1], vec![1]).expect("stage should succeed");
        writer.stage(vec![2], vec![2]).expect("stage should succeed");
        assert_eq!(target.commit_count(), 2);
    }

    #[test]
    fn test_cancel_stops_after_boundary_commit() {
        let target = MemoryStore::new();
        let cancel = CancellationToken::new();
        let options = TranscodeOptions::default()
            .with_batch_limit(2)
            .with_cancel(cancel.clone());
        let mut writer = BatchWriter::new(&target, &options, "test");

        writer.stage(vec![1], vec![1]).expect("stage should succeed");
        cancel.cancel();
        // Below the limit: nothing is committed and no cancellation point is hit.
        assert_eq!(target.len(), 0);
        let err = writer
            .stage(vec![2], vec![2])
            .expect_err("boundary after cancel should stop");
        assert!(err.is_cancelled());
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_commit_failure_carries_label() {
        let target = MemoryStore::new();
        target.fail_commits_after(0);
        let options = TranscodeOptions::default().with_batch_limit(1);
        let mut writer = BatchWriter::new(&target, &options, "tick data");
        let err = writer
            .stage(vec![1], vec![1])
            .expect_err("commit should fail");
        assert!(err.to_string().contains("committing tick data batch"));
    }

    #[test]
    fn test_stats_add_assign() {
        let mut total = TranscodeStats {
            scanned: 1,
            written: 2,
            flushes: 3,
        };
        total += TranscodeStats {
            scanned: 10,
            written: 20,
            flushes: 30,
        };
        assert_eq!(
            total,
            TranscodeStats {
                scanned: 11,
                written: 22,
                flushes: 33
            }
        );
    }
}
