//! Aggregation fold.
//!
//! A transcoding pass that also keeps one selected record per
//! `(epoch, interval index)` group. The fold may be driven over several ranges
//! of the same namespace before the groups are persisted once, one synthetic
//! record per epoch, through a batch stream of its own.
//!
//! Groups live only in memory for the duration of the fold.

use std::collections::BTreeMap;

use archmig_core::{ArchmigResult, ConsistencyError, KeyRange};
use archmig_storage::{SourceStore, TargetStore};

use crate::batch::{BatchWriter, TranscodeOptions, TranscodeStats};
use crate::interval::IntervalIndexSet;

/// A record that can be attributed to a tick of an epoch.
pub trait Attributed {
    /// `(epoch, tick)` of the record, `None` when it carries neither.
    fn attribution(&self) -> Option<(u32, u32)>;
}

/// Decides which record of a group is kept.
pub trait Selector<V> {
    /// Whether `candidate` should replace `current`.
    fn prefer(&self, current: &V, candidate: &V) -> bool;
}

/// Keeps the record with the greatest tick number. Ties keep the first seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreatestTick;

impl<V: Attributed> Selector<V> for GreatestTick {
    fn prefer(&self, current: &V, candidate: &V) -> bool {
        let tick = |v: &V| v.attribution().map(|(_, tick)| tick);
        tick(candidate) > tick(current)
    }
}

/// Selected records, keyed by epoch then interval index.
pub type Groups<V> = BTreeMap<u32, BTreeMap<usize, V>>;

pub struct AggregationFold<'i, V, Sel = GreatestTick> {
    intervals: &'i IntervalIndexSet,
    selector: Sel,
    groups: Groups<V>,
    stats: TranscodeStats,
}

impl<'i, V: Attributed> AggregationFold<'i, V, GreatestTick> {
    pub fn new(intervals: &'i IntervalIndexSet) -> Self {
        Self::with_selector(intervals, GreatestTick)
    }
}

impl<'i, V: Attributed, Sel: Selector<V>> AggregationFold<'i, V, Sel> {
    pub fn with_selector(intervals: &'i IntervalIndexSet, selector: Sel) -> Self {
        Self {
            intervals,
            selector,
            groups: BTreeMap::new(),
            stats: TranscodeStats::default(),
        }
    }

    /// Attribute `value` to its group and keep it if the selector prefers it.
    pub fn observe(&mut self, value: V) -> ArchmigResult<()> {
        let (epoch, tick) = value
            .attribution()
            .ok_or_else(|| ConsistencyError::Unattributed {
                label: std::any::type_name::<V>()
                    .rsplit("::")
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            })?;
        let interval = self.intervals.index_for(epoch, tick)?;
        let group = self.groups.entry(epoch).or_default();
        let keep_current = group
            .get(&interval)
            .is_some_and(|current| !self.selector.prefer(current, &value));
        if !keep_current {
            group.insert(interval, value);
        }
        Ok(())
    }

    /// Transcode `range` while folding every decoded record.
    ///
    /// `transform` returns the decoded record together with the re-encoded
    /// key and value for the per-record stream.
    pub fn transcode<S, T, F>(
        &mut self,
        source: &S,
        target: &T,
        range: &KeyRange,
        options: &TranscodeOptions,
        label: &'static str,
        mut transform: F,
    ) -> ArchmigResult<TranscodeStats>
    where
        S: SourceStore,
        T: TargetStore,
        F: FnMut(&[u8], &[u8]) -> ArchmigResult<(V, Vec<u8>, Vec<u8>)>,
    {
        let mut writer = BatchWriter::new(target, options, label);
        let mut scanned = 0u64;
        source.scan(range, |key, value| {
            scanned += 1;
            let (record, new_key, new_value) = transform(key, value)?;
            self.observe(record)?;
            writer.stage(new_key, new_value)
        })?;

        let mut stats = writer.finish()?;
        stats.scanned = scanned;
        self.stats += stats;
        Ok(stats)
    }

    pub fn groups(&self) -> &Groups<V> {
        &self.groups
    }

    /// Totals across every range transcoded so far.
    pub fn stats(&self) -> TranscodeStats {
        self.stats
    }

    /// Write one record per epoch holding that epoch's selected records.
    pub fn persist<T, F>(
        self,
        target: &T,
        options: &TranscodeOptions,
        label: &'static str,
        mut encode: F,
    ) -> ArchmigResult<TranscodeStats>
    where
        T: TargetStore,
        F: FnMut(u32, BTreeMap<usize, V>) -> ArchmigResult<(Vec<u8>, Vec<u8>)>,
    {
        let mut writer = BatchWriter::new(target, options, label);
        for (epoch, selected) in self.groups {
            let (key, value) = encode(epoch, selected)?;
            writer.stage(key, value)?;
        }
        writer.finish()
    }
}
