//! What a migration run wrote.

use std::collections::BTreeMap;

use archmig_core::Namespace;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Records committed per target namespace.
    pub records: BTreeMap<Namespace, u64>,
    pub compacted: bool,
}

impl EpochReport {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            started_at: Utc::now(),
            finished_at: None,
            records: BTreeMap::new(),
            compacted: false,
        }
    }

    pub fn add(&mut self, namespace: Namespace, written: u64) {
        *self.records.entry(namespace).or_default() += written;
    }

    pub fn written(&self, namespace: Namespace) -> u64 {
        self.records.get(&namespace).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.records.values().sum()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Completed epochs in the order they ran.
    pub epochs: Vec<EpochReport>,
    /// Records copied per namespace by the single-store copy path.
    pub copied: BTreeMap<Namespace, u64>,
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            epochs: Vec::new(),
            copied: BTreeMap::new(),
        }
    }
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self, epoch: u32) -> Option<&EpochReport> {
        self.epochs.iter().rev().find(|r| r.epoch == epoch)
    }

    pub fn total_written(&self) -> u64 {
        self.epochs.iter().map(EpochReport::total).sum::<u64>() + self.copied.values().sum::<u64>()
    }

    pub fn touch(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_report_accumulates_per_namespace() {
        let mut report = EpochReport::new(3);
        report.add(Namespace::TickData, 10);
        report.add(Namespace::TickData, 5);
        report.add(Namespace::QuorumData, 7);
        assert_eq!(report.written(Namespace::TickData), 15);
        assert_eq!(report.written(Namespace::Transaction), 0);
        assert_eq!(report.total(), 22);
        assert!(report.duration_ms().is_none());
        report.finish();
        assert!(report.duration_ms().is_some_and(|ms| ms >= 0));
    }

    #[test]
    fn test_migration_report_totals_and_lookup() {
        let mut report = MigrationReport::new();
        let mut first = EpochReport::new(1);
        first.add(Namespace::TickData, 4);
        report.epochs.push(first);
        report.copied.insert(Namespace::ChainDigest, 6);
        assert_eq!(report.total_written(), 10);
        assert!(report.epoch(1).is_some());
        assert!(report.epoch(2).is_none());
    }

    #[test]
    fn test_report_serializes_namespace_keys() {
        let mut report = EpochReport::new(1);
        report.add(Namespace::QuorumData, 2);
        let json = serde_json::to_value(&report).expect("serialize should succeed");
        assert_eq!(json["records"]["quorum_data"], 2);
    }
}
