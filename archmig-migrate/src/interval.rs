//! Interval attribution: which processed tick range of an epoch a tick
//! belongs to.

use std::collections::BTreeMap;

use archmig_core::{ConsistencyError, EpochMetadata, StoreMetadata, TickRange};

/// Processed tick ranges of one epoch, in stored order.
#[derive(Debug, Clone)]
pub struct IntervalIndex {
    epoch: u32,
    ranges: Vec<TickRange>,
}

impl IntervalIndex {
    pub fn new(epoch: u32, ranges: Vec<TickRange>) -> Self {
        Self { epoch, ranges }
    }

    pub fn from_metadata(metadata: &EpochMetadata) -> Self {
        Self::new(metadata.epoch, metadata.processed_tick_ranges.clone())
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Position of the first range containing `tick`.
    ///
    /// Ranges per epoch are few, so a linear scan is enough.
    pub fn index_for(&self, tick: u32) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(tick))
    }
}

/// Interval indices for a set of epochs.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndexSet {
    epochs: BTreeMap<u32, IntervalIndex>,
}

impl IntervalIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store_metadata(metadata: &StoreMetadata) -> Self {
        let mut set = Self::new();
        for epoch in metadata.iter() {
            set.insert(IntervalIndex::from_metadata(epoch));
        }
        set
    }

    pub fn insert(&mut self, index: IntervalIndex) {
        self.epochs.insert(index.epoch, index);
    }

    /// # Errors
    ///
    /// [`ConsistencyError::EpochMetadataMissing`] for an unknown epoch and
    /// [`ConsistencyError::TickOutsideIntervals`] when no range holds the tick.
    pub fn index_for(&self, epoch: u32, tick: u32) -> Result<usize, ConsistencyError> {
        let index = self
            .epochs
            .get(&epoch)
            .ok_or(ConsistencyError::EpochMetadataMissing { epoch })?;
        index
            .index_for(tick)
            .ok_or(ConsistencyError::TickOutsideIntervals { epoch, tick })
    }
}

impl From<&EpochMetadata> for IntervalIndexSet {
    fn from(metadata: &EpochMetadata) -> Self {
        let mut set = Self::new();
        set.insert(IntervalIndex::from_metadata(metadata));
        set
    }
}
