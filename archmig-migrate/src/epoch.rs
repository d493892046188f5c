//! The ordered steps that move one epoch into its own target store.
//!
//! Epoch metadata goes first, then the tick related data of every processed
//! tick range, then the quorum data fold which also writes the last-tick
//! quorum record of the epoch.

use std::collections::BTreeMap;

use archmig_core::keys::numeric_key;
use archmig_core::{
    ArchmigResult, ConsistencyError, EpochMetadata, KeyRange, Namespace, RecordCodec, ResultExt,
    TickRange,
};
use archmig_storage::archive::VOTE_SIGNATURE;
use archmig_storage::{ArchiveV1, SourceStore, TargetStore};
use tracing::{debug, info};

use crate::batch::{BatchWriter, TranscodeOptions};
use crate::fold::AggregationFold;
use crate::interval::IntervalIndexSet;
use crate::report::EpochReport;
use crate::transcode::transcode;
use crate::transforms;

/// Transaction ids of each tick, in tick order.
type TickTransactions = BTreeMap<u32, Vec<String>>;

pub(crate) struct EpochJob<'a, S, T> {
    pub source: &'a S,
    pub target: &'a T,
    pub metadata: &'a EpochMetadata,
    pub options: &'a TranscodeOptions,
    /// Epochs above this carry a target tick vote signature.
    pub signature_epoch_threshold: u32,
}

impl<'a, S: SourceStore, T: TargetStore> EpochJob<'a, S, T> {
    pub fn run(&self, report: &mut EpochReport) -> ArchmigResult<()> {
        self.migrate_metadata(report)
            .context("migrating epoch metadata")?;
        for range in &self.metadata.processed_tick_ranges {
            self.migrate_tick_range(*range, report)
                .with_context(|| format!("migrating ticks {}", range))?;
        }
        self.migrate_quorum_data(report)
            .context("migrating quorum data")?;
        Ok(())
    }

    fn epoch(&self) -> u32 {
        self.metadata.epoch
    }

    fn archive(&self) -> ArchiveV1<'a, S> {
        ArchiveV1::new(self.source)
    }

    fn migrate_metadata(&self, report: &mut EpochReport) -> ArchmigResult<()> {
        let epoch = self.epoch();
        let archive = self.archive();
        let mut writer = BatchWriter::new(self.target, self.options, "epoch metadata");
        let mut written = Vec::with_capacity(4);

        let computors = archive
            .computors(epoch)?
            .ok_or_else(|| ConsistencyError::MissingRecord {
                namespace: Namespace::ComputorList,
                id: epoch.to_string(),
            })?;
        let (key, value) = transforms::computors(epoch, computors)?;
        writer.stage(key, value)?;
        written.push(Namespace::ComputorList);

        let intervals = archive
            .processed_tick_intervals_for(epoch)?
            .filter(|per_epoch| !per_epoch.intervals.is_empty())
            .ok_or(ConsistencyError::EmptyTickRanges { epoch })?;
        let (key, value) = transforms::processed_tick_intervals(intervals)?;
        writer.stage(key, value)?;
        written.push(Namespace::ProcessedTickIntervals);

        let (key, value) =
            transforms::last_processed_tick(epoch, self.metadata.last_processed_tick)?;
        writer.stage(key, value)?;
        written.push(Namespace::LastProcessedTick);

        if epoch > self.signature_epoch_threshold {
            let signature = archive.target_tick_vote_signature(epoch)?.ok_or_else(|| {
                ConsistencyError::MissingRecord {
                    namespace: Namespace::TargetTickVoteSignature,
                    id: epoch.to_string(),
                }
            })?;
            writer.stage(
                numeric_key(Namespace::TargetTickVoteSignature, u64::from(epoch)),
                VOTE_SIGNATURE.encode(&signature)?,
            )?;
            written.push(Namespace::TargetTickVoteSignature);
        }

        writer.finish()?;
        for namespace in written {
            report.add(namespace, 1);
        }
        debug!(epoch, "epoch metadata migrated");
        Ok(())
    }

    fn migrate_tick_range(&self, range: TickRange, report: &mut EpochReport) -> ArchmigResult<()> {
        let tick_transactions = self
            .migrate_tick_data(range, report)
            .context("migrating tick data")?;
        self.migrate_transactions(&tick_transactions, report)
            .context("migrating transactions")?;
        self.migrate_transaction_statuses(&tick_transactions, report)
            .context("migrating transaction statuses")?;
        info!(
            epoch = self.epoch(),
            range = %range,
            ticks = tick_transactions.len(),
            "tick range migrated"
        );
        Ok(())
    }

    /// Transcode the tick data of `range`, collecting each tick's
    /// transaction ids for the lookups that follow.
    fn migrate_tick_data(
        &self,
        range: TickRange,
        report: &mut EpochReport,
    ) -> ArchmigResult<TickTransactions> {
        let mut tick_transactions = TickTransactions::new();
        let stats = transcode(
            self.source,
            self.target,
            &KeyRange::ticks(Namespace::TickData, range),
            self.options,
            "tick data",
            |key, value| {
                let (record, new_key, new_value) = transforms::tick_data(key, value)?;
                tick_transactions
                    .entry(record.tick_number)
                    .or_default()
                    .extend(record.transaction_ids);
                Ok((new_key, new_value))
            },
        )?;
        report.add(Namespace::TickData, stats.written);
        Ok(tick_transactions)
    }

    fn migrate_transactions(
        &self,
        tick_transactions: &TickTransactions,
        report: &mut EpochReport,
    ) -> ArchmigResult<()> {
        let archive = self.archive();
        let mut writer = BatchWriter::new(self.target, self.options, "transactions");
        for tx_id in tick_transactions.values().flatten() {
            let tx = archive
                .transaction(tx_id)?
                .ok_or_else(|| ConsistencyError::MissingRecord {
                    namespace: Namespace::Transaction,
                    id: tx_id.clone(),
                })?;
            let (key, value) = transforms::transaction(tx)?;
            writer.stage(key, value)?;
        }
        let stats = writer.finish()?;
        report.add(Namespace::Transaction, stats.written);
        Ok(())
    }

    /// Per-transaction statuses plus one aggregated status record per tick,
    /// written even for ticks without transactions.
    fn migrate_transaction_statuses(
        &self,
        tick_transactions: &TickTransactions,
        report: &mut EpochReport,
    ) -> ArchmigResult<()> {
        let archive = self.archive();
        let mut writer = BatchWriter::new(self.target, self.options, "transaction statuses");
        let mut statuses_written = 0u64;
        for (&tick, tx_ids) in tick_transactions {
            let mut statuses = Vec::with_capacity(tx_ids.len());
            for tx_id in tx_ids {
                let status = archive.transaction_status(tx_id)?.ok_or_else(|| {
                    ConsistencyError::MissingRecord {
                        namespace: Namespace::TransactionStatus,
                        id: tx_id.clone(),
                    }
                })?;
                let (record, key, value) = transforms::transaction_status(status)?;
                writer.stage(key, value)?;
                statuses.push(record);
                statuses_written += 1;
            }
            let (key, value) = transforms::tick_transactions_status(tick, statuses)?;
            writer.stage(key, value)?;
        }
        writer.finish()?;
        report.add(Namespace::TransactionStatus, statuses_written);
        report.add(
            Namespace::TickTransactionsStatus,
            tick_transactions.len() as u64,
        );
        Ok(())
    }

    /// Reduce every quorum record of the epoch and keep the greatest tick of
    /// each processed tick range for the last-tick quorum record.
    fn migrate_quorum_data(&self, report: &mut EpochReport) -> ArchmigResult<()> {
        let intervals = IntervalIndexSet::from(self.metadata);
        let mut fold = AggregationFold::new(&intervals);
        for range in &self.metadata.processed_tick_ranges {
            fold.transcode(
                self.source,
                self.target,
                &KeyRange::ticks(Namespace::QuorumData, *range),
                self.options,
                "quorum data",
                transforms::quorum_data,
            )
            .with_context(|| format!("folding quorum data {}", range))?;
        }
        report.add(Namespace::QuorumData, fold.stats().written);

        let persisted = fold.persist(
            self.target,
            self.options,
            "last tick quorum data",
            transforms::last_tick_quorum_data,
        )?;
        report.add(
            Namespace::LastTickQuorumDataPerEpochInterval,
            persisted.written,
        );
        debug!(
            epoch = self.epoch(),
            quorum = report.written(Namespace::QuorumData),
            "quorum data migrated"
        );
        Ok(())
    }
}
