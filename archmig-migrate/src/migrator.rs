//! Migration orchestrator.
//!
//! Owns the source store and a target provider, assembles the store metadata
//! once and then migrates epochs one at a time, each into its own target.
//!
//! ```text
//! Idle -> MetadataLoaded -> MigratingEpoch(e) -> Done -> MigratingEpoch(e') ...
//!                                  |
//!                                  +-> Failed
//! ```
//!
//! `Failed` is terminal for migrations; start a new migrator to retry. Since
//! every write overwrites by key, re-running an epoch is safe.

use std::collections::BTreeMap;
use std::fmt;

use archmig_core::{
    ArchmigError, ArchmigResult, ConsistencyError, EpochMetadata, EpochSelection, KeyRange,
    MigratorConfig, Namespace, ResultExt, RunError, StoreMetadata,
};
use archmig_storage::{assemble, Durability, SourceStore, TargetProvider, TargetStore};
use tracing::{error, info, warn};

use crate::batch::TranscodeOptions;
use crate::cancel::CancellationToken;
use crate::epoch::EpochJob;
use crate::report::{EpochReport, MigrationReport};
use crate::transcode::{identity, transcode};

/// Where the migrator is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigratorState {
    Idle,
    MetadataLoaded,
    MigratingEpoch(u32),
    Done,
    Failed { epoch: Option<u32>, reason: String },
}

impl MigratorState {
    fn can_migrate(&self) -> bool {
        matches!(self, MigratorState::MetadataLoaded | MigratorState::Done)
    }
}

impl fmt::Display for MigratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigratorState::Idle => write!(f, "idle"),
            MigratorState::MetadataLoaded => write!(f, "metadata loaded"),
            MigratorState::MigratingEpoch(epoch) => write!(f, "migrating epoch {}", epoch),
            MigratorState::Done => write!(f, "done"),
            MigratorState::Failed {
                epoch: Some(epoch), ..
            } => write!(f, "failed at epoch {}", epoch),
            MigratorState::Failed { epoch: None, .. } => write!(f, "failed"),
        }
    }
}

pub struct Migrator<S, P> {
    source: S,
    targets: P,
    config: MigratorConfig,
    metadata: StoreMetadata,
    state: MigratorState,
    cancel: CancellationToken,
    report: MigrationReport,
}

impl<S: SourceStore, P: TargetProvider> Migrator<S, P> {
    /// A migrator in the `Idle` state. Call [`Migrator::load_metadata`] before
    /// migrating.
    pub fn new(source: S, targets: P, config: MigratorConfig) -> Self {
        Self {
            source,
            targets,
            config,
            metadata: StoreMetadata::new(),
            state: MigratorState::Idle,
            cancel: CancellationToken::new(),
            report: MigrationReport::new(),
        }
    }

    /// Share an existing token, e.g. one wired to a signal handler.
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// [`Migrator::new`] followed by [`Migrator::load_metadata`].
    pub fn open(source: S, targets: P, config: MigratorConfig) -> ArchmigResult<Self> {
        let mut migrator = Self::new(source, targets, config);
        migrator.load_metadata()?;
        Ok(migrator)
    }

    /// Assemble the store metadata from the source.
    pub fn load_metadata(&mut self) -> ArchmigResult<&StoreMetadata> {
        if self.state != MigratorState::Idle {
            return Err(self.invalid_state("load metadata"));
        }
        match assemble(&self.source) {
            Ok(metadata) => {
                info!(epochs = metadata.len(), "store metadata loaded");
                self.metadata = metadata;
                self.state = MigratorState::MetadataLoaded;
                Ok(&self.metadata)
            }
            Err(e) => {
                let e = e.context("loading store metadata");
                self.state = MigratorState::Failed {
                    epoch: None,
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    pub fn state(&self) -> &MigratorState {
        &self.state
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    pub fn into_report(self) -> MigrationReport {
        self.report
    }

    /// Token that stops the run at the next batch boundary once cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(&mut self, selection: EpochSelection) -> ArchmigResult<()> {
        selection.validate()?;
        match selection {
            EpochSelection::All => self.migrate_all(),
            EpochSelection::Epoch(epoch) => self.migrate_epoch(epoch),
            EpochSelection::Range { start, end } => self.migrate_range(start, end),
        }
    }

    /// Migrate one epoch into the target the provider opens for it.
    pub fn migrate_epoch(&mut self, epoch: u32) -> ArchmigResult<()> {
        if !self.state.can_migrate() {
            return Err(self.invalid_state("migrate epoch"));
        }
        if self.cancel.is_cancelled() {
            let e = ArchmigError::from(RunError::Cancelled {
                committed: self.report.total_written(),
            });
            return Err(self.fail(Some(epoch), e));
        }

        info!(epoch, "migrating epoch");
        self.state = MigratorState::MigratingEpoch(epoch);
        let mut epoch_report = EpochReport::new(epoch);
        let result = self.run_epoch(epoch, &mut epoch_report);
        self.report.touch();

        match result {
            Ok(()) => {
                epoch_report.finish();
                info!(
                    epoch,
                    records = epoch_report.total(),
                    duration_ms = epoch_report.duration_ms().unwrap_or_default(),
                    compacted = epoch_report.compacted,
                    "epoch migrated"
                );
                self.report.epochs.push(epoch_report);
                self.state = MigratorState::Done;
                Ok(())
            }
            Err(e) => Err(self.fail(Some(epoch), e.context(format!("migrating epoch {}", epoch)))),
        }
    }

    /// Migrate `start..=end` in ascending order, stopping at the first
    /// failure. An epoch without metadata inside the range is a failure.
    pub fn migrate_range(&mut self, start: u32, end: u32) -> ArchmigResult<()> {
        EpochSelection::Range { start, end }.validate()?;
        for epoch in start..=end {
            self.migrate_epoch(epoch)?;
        }
        Ok(())
    }

    /// Migrate every epoch with metadata, in ascending order.
    pub fn migrate_all(&mut self) -> ArchmigResult<()> {
        let epochs = self.metadata.epoch_numbers();
        if epochs.is_empty() {
            warn!("source store has no epochs to migrate");
        }
        for epoch in epochs {
            self.migrate_epoch(epoch)?;
        }
        Ok(())
    }

    /// Copy whole namespaces from the source into `target` without
    /// re-encoding. Returns the records copied per namespace.
    pub fn copy_namespaces<T: TargetStore>(
        &mut self,
        target: &T,
        namespaces: &[Namespace],
    ) -> ArchmigResult<BTreeMap<Namespace, u64>> {
        if matches!(
            self.state,
            MigratorState::Failed { .. } | MigratorState::MigratingEpoch(_)
        ) {
            return Err(self.invalid_state("copy namespaces"));
        }

        let options = self.options();
        let mut copied = BTreeMap::new();
        for &namespace in namespaces {
            let stats = transcode(
                &self.source,
                target,
                &KeyRange::namespace(namespace),
                &options,
                namespace.name(),
                identity,
            )
            .with_context(|| format!("copying namespace {}", namespace));
            let stats = match stats {
                Ok(stats) => stats,
                Err(e) => return Err(self.fail(None, e)),
            };
            info!(namespace = %namespace, records = stats.written, "namespace copied");
            *self.report.copied.entry(namespace).or_default() += stats.written;
            copied.insert(namespace, stats.written);
        }
        self.report.touch();
        Ok(copied)
    }

    fn run_epoch(&self, epoch: u32, report: &mut EpochReport) -> ArchmigResult<()> {
        let metadata = self
            .metadata
            .get(epoch)
            .ok_or(ConsistencyError::EpochMetadataMissing { epoch })?;
        let target = self
            .targets
            .open_epoch(epoch)
            .context("opening target store")?;

        // Closed on failure too; a failed epoch must not keep its environment
        // or a compacted copy around.
        let outcome = self.fill_epoch(&target, metadata, report);
        let closed = target.close().context("closing target store");
        match (outcome, closed) {
            (Err(e), Err(close_err)) => {
                warn!(epoch, error = %close_err, "closing failed target store");
                Err(e)
            }
            (outcome, closed) => outcome.and(closed),
        }
    }

    fn fill_epoch(
        &self,
        target: &P::Store,
        metadata: &EpochMetadata,
        report: &mut EpochReport,
    ) -> ArchmigResult<()> {
        let options = self.options();
        EpochJob {
            source: &self.source,
            target,
            metadata,
            options: &options,
            signature_epoch_threshold: self.config.signature_epoch_threshold,
        }
        .run(report)?;

        if self.config.compact_after_migrate {
            target
                .compact(&KeyRange::new(vec![0x00], vec![0xFF]), true)
                .context("compacting target store")?;
            report.compacted = true;
        }
        Ok(())
    }

    fn options(&self) -> TranscodeOptions {
        TranscodeOptions {
            batch_limit: self.config.batch_size,
            durability: Durability::Durable,
            cancel: self.cancel.clone(),
        }
    }

    fn invalid_state(&self, operation: &str) -> ArchmigError {
        RunError::InvalidState {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
        .into()
    }

    fn fail(&mut self, epoch: Option<u32>, e: ArchmigError) -> ArchmigError {
        if e.is_cancelled() {
            warn!(epoch = ?epoch, error = %e, "migration cancelled");
        } else {
            error!(epoch = ?epoch, error = %e, "migration failed");
        }
        self.state = MigratorState::Failed {
            epoch,
            reason: e.to_string(),
        };
        e
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archmig_storage::{MemoryStore, MemoryTargets};

    fn empty_migrator() -> Migrator<MemoryStore, MemoryTargets> {
        Migrator::new(
            MemoryStore::new(),
            MemoryTargets::new(),
            MigratorConfig::default(),
        )
    }

    #[test]
    fn test_migrate_before_metadata_is_invalid_state() {
        let mut migrator = empty_migrator();
        let err = migrator
            .migrate_epoch(1)
            .expect_err("idle migrator should refuse");
        assert!(matches!(
            err,
            ArchmigError::Run(RunError::InvalidState { .. })
        ));
        assert_eq!(migrator.state(), &MigratorState::Idle);
    }

    #[test]
    fn test_load_metadata_only_once() {
        let mut migrator = empty_migrator();
        migrator.load_metadata().expect("load should succeed");
        assert_eq!(migrator.state(), &MigratorState::MetadataLoaded);
        assert!(migrator.load_metadata().is_err());
    }

    #[test]
    fn test_missing_epoch_fails_migrator() {
        let mut migrator = empty_migrator();
        migrator.load_metadata().expect("load should succeed");
        let err = migrator
            .migrate_epoch(7)
            .expect_err("unknown epoch should fail");
        assert!(matches!(
            err.root(),
            ArchmigError::Consistency(ConsistencyError::EpochMetadataMissing { epoch: 7 })
        ));
        assert!(matches!(
            migrator.state(),
            MigratorState::Failed { epoch: Some(7), .. }
        ));
        // Failed is terminal.
        assert!(migrator.migrate_epoch(7).is_err());
        assert!(migrator
            .copy_namespaces(&MemoryStore::new(), &[Namespace::ChainDigest])
            .is_err());
    }

    #[test]
    fn test_migrate_all_on_empty_store_is_noop() {
        let mut migrator = empty_migrator();
        migrator.load_metadata().expect("load should succeed");
        migrator.migrate_all().expect("migrate all should succeed");
        assert!(migrator.report().epochs.is_empty());
        assert_eq!(migrator.state(), &MigratorState::MetadataLoaded);
    }

    #[test]
    fn test_inverted_range_is_config_error() {
        let mut migrator = empty_migrator();
        migrator.load_metadata().expect("load should succeed");
        let err = migrator
            .migrate_range(9, 3)
            .expect_err("inverted range should fail");
        assert!(matches!(err, ArchmigError::Config(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut migrator = empty_migrator();
        migrator.load_metadata().expect("load should succeed");
        migrator.cancellation_token().cancel();
        let err = migrator
            .migrate_epoch(1)
            .expect_err("cancelled migrator should stop");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(MigratorState::MigratingEpoch(4).to_string(), "migrating epoch 4");
        assert_eq!(
            MigratorState::Failed {
                epoch: Some(2),
                reason: "x".into()
            }
            .to_string(),
            "failed at epoch 2"
        );
    }
}
