//! Store metadata assembly.
//!
//! Joins two independent v1 indices by epoch: the processed tick intervals
//! per epoch and the last processed tick per epoch.

use archmig_core::{ArchmigResult, EpochMetadata, ResultExt, StoreMetadata, TickRange};
use tracing::{debug, warn};

use crate::archive::ArchiveV1;
use crate::traits::SourceStore;

/// Build the metadata of every epoch in `source`.
///
/// An epoch without a last processed tick entry gets 0. An epoch whose
/// interval list is empty is left out, since there is nothing to migrate.
pub fn assemble<S: SourceStore>(source: &S) -> ArchmigResult<StoreMetadata> {
    let archive = ArchiveV1::new(source);
    let last_ticks = archive
        .last_processed_ticks_per_epoch()
        .context("reading last processed tick per epoch")?;
    let intervals = archive
        .processed_tick_intervals()
        .context("reading processed tick intervals per epoch")?;

    let mut metadata = StoreMetadata::new();
    for per_epoch in intervals {
        if per_epoch.intervals.is_empty() {
            warn!(epoch = per_epoch.epoch, "epoch has no processed tick intervals, skipping");
            continue;
        }
        let last_processed_tick = last_ticks.get(&per_epoch.epoch).copied().unwrap_or_else(|| {
            debug!(epoch = per_epoch.epoch, "no last processed tick recorded, using 0");
            0
        });
        metadata.insert(EpochMetadata {
            epoch: per_epoch.epoch,
            processed_tick_ranges: per_epoch
                .intervals
                .iter()
                .map(|i| TickRange::new(i.initial_processed_tick, i.last_processed_tick))
                .collect(),
            last_processed_tick,
        });
    }

    debug!(epochs = metadata.len(), "assembled store metadata");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{INTERVALS, LAST_TICK_PER_EPOCH};
    use crate::memory::MemoryStore;
    use archmig_core::keys::numeric_key;
    use archmig_core::records::v1;
    use archmig_core::{Namespace, RecordCodec};

    fn put_intervals(store: &MemoryStore, epoch: u32, ranges: &[(u32, u32)]) {
        let value = v1::ProcessedTickIntervalsPerEpoch {
            epoch,
            intervals: ranges
                .iter()
                .map(|&(s, e)| v1::ProcessedTickInterval {
                    initial_processed_tick: s,
                    last_processed_tick: e,
                })
                .collect(),
        };
        store
            .put(
                numeric_key(Namespace::ProcessedTickIntervals, u64::from(epoch)),
                INTERVALS.encode(&value).expect("encode should succeed"),
            )
            .expect("put should succeed");
    }

    fn put_last_tick(store: &MemoryStore, epoch: u32, tick: u32) {
        store
            .put(
                numeric_key(Namespace::LastProcessedTickPerEpoch, u64::from(epoch)),
                LAST_TICK_PER_EPOCH.encode(&tick).expect("encode should succeed"),
            )
            .expect("put should succeed");
    }

    #[test]
    fn test_joins_indices_by_epoch() {
        let store = MemoryStore::new();
        put_last_tick(&store, 3, 120);
        put_intervals(&store, 3, &[(1, 50), (51, 120)]);

        let metadata = assemble(&store).expect("assemble should succeed");
        let epoch = metadata.get(3).expect("epoch 3 should be present");
        assert_eq!(epoch.last_processed_tick, 120);
        assert_eq!(
            epoch.processed_tick_ranges,
            vec![TickRange::new(1, 50), TickRange::new(51, 120)]
        );
    }

    #[test]
    fn test_missing_last_tick_defaults_to_zero() {
        let store = MemoryStore::new();
        put_intervals(&store, 9, &[(10, 20)]);

        let metadata = assemble(&store).expect("assemble should succeed");
        assert_eq!(metadata.get(9).map(|e| e.last_processed_tick), Some(0));
    }

    #[test]
    fn test_epoch_without_intervals_is_absent() {
        let store = MemoryStore::new();
        put_last_tick(&store, 5, 77);
        put_intervals(&store, 6, &[]);
        put_intervals(&store, 7, &[(1, 2)]);

        let metadata = assemble(&store).expect("assemble should succeed");
        assert_eq!(metadata.epoch_numbers(), vec![7]);
    }

    #[test]
    fn test_empty_store_gives_empty_metadata() {
        let metadata = assemble(&MemoryStore::new()).expect("assemble should succeed");
        assert!(metadata.is_empty());
    }
}
