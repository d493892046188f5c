//! Per-epoch metadata assembled from the source store indices.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive range of tick numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickRange {
    pub start: u32,
    pub end: u32,
}

impl TickRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, tick: u32) -> bool {
        self.start <= tick && tick <= self.end
    }

    /// Number of ticks covered, zero for an inverted range.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            u64::from(self.end - self.start) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// What the source store knows about one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochMetadata {
    pub epoch: u32,
    /// Ordered as stored; index position is the interval index.
    pub processed_tick_ranges: Vec<TickRange>,
    pub last_processed_tick: u32,
}

impl EpochMetadata {
    /// Total number of ticks across every processed range.
    pub fn tick_count(&self) -> u64 {
        self.processed_tick_ranges.iter().map(TickRange::len).sum()
    }
}

/// Metadata for every epoch in the source store, ordered by epoch.
///
/// Built once when the source is opened and passed explicitly to whatever
/// needs it; it is never mutated during a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub epochs: BTreeMap<u32, EpochMetadata>,
}

impl StoreMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metadata: EpochMetadata) {
        self.epochs.insert(metadata.epoch, metadata);
    }

    pub fn get(&self, epoch: u32) -> Option<&EpochMetadata> {
        self.epochs.get(&epoch)
    }

    /// Epochs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &EpochMetadata> {
        self.epochs.values()
    }

    pub fn epoch_numbers(&self) -> Vec<u32> {
        self.epochs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for meta in self.iter() {
            out.push_str(&format!("Epoch: {}\n", meta.epoch));
            out.push_str(&format!(
                "  - Last processed tick: {}\n",
                meta.last_processed_tick
            ));
            out.push_str("  - Tick ranges:\n");
            for range in &meta.processed_tick_ranges {
                out.push_str(&format!("    - {} : {}\n", range.start, range.end));
            }
        }
        out
    }
}

// =============================================================================
// TESTS
// =============================================================================
