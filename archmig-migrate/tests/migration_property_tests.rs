//! Property-Based Tests for Epoch Migration
//!
//! For any epoch layout and any batch limit, the migrated target SHALL hold
//! exactly the records a single-batch migration produces, with one tick data,
//! quorum data and tick status record per processed tick and one last-tick
//! quorum entry per processed tick range. Every migrated value SHALL decode
//! with the v2 schema of its namespace and encode back to the same bytes.

use archmig_core::keys::numeric_key;
use archmig_core::{KeyRange, MigratorConfig, Namespace, RecordCodec};
use archmig_migrate::transforms::{reencode_v2, LAST_TICK_QUORUM_V2};
use archmig_migrate::Migrator;
use archmig_storage::{MemoryStore, MemoryTargets, TargetStore};
use archmig_test_utils::assertions::dump_all;
use archmig_test_utils::fixtures::{ArchiveBuilder, EpochFixture};
use archmig_test_utils::generators::arb_epoch_fixture;
use proptest::prelude::*;

fn migrate(fixture: &EpochFixture, batch_size: usize) -> Result<MemoryStore, TestCaseError> {
    let source = ArchiveBuilder::new().epoch_fixture(fixture).build();
    let targets = MemoryTargets::new();
    let config = MigratorConfig {
        batch_size,
        ..MigratorConfig::default()
    };
    let mut migrator = Migrator::open(source, targets.clone(), config)
        .map_err(|e| TestCaseError::fail(format!("open failed: {}", e)))?;
    migrator
        .migrate_epoch(fixture.epoch)
        .map_err(|e| TestCaseError::fail(format!("migration failed: {}", e)))?;
    targets
        .epoch(fixture.epoch)
        .ok_or_else(|| TestCaseError::fail("target was never opened"))
}

fn count(store: &MemoryStore, namespace: Namespace) -> usize {
    store
        .count_range(&KeyRange::namespace(namespace))
        .unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_batch_limit_never_changes_target(
        fixture in arb_epoch_fixture(),
        batch_size in 1usize..20,
    ) {
        let batched = migrate(&fixture, batch_size)?;
        let single = migrate(&fixture, 10_000)?;
        prop_assert_eq!(dump_all(&batched), dump_all(&single));
    }

    #[test]
    fn prop_migrated_records_reencode_identically(
        fixture in arb_epoch_fixture(),
        batch_size in 1usize..20,
    ) {
        let store = migrate(&fixture, batch_size)?;
        for (key, value) in dump_all(&store) {
            let namespace = Namespace::from_tag(key[0])
                .ok_or_else(|| TestCaseError::fail(format!("unknown tag {:#04x}", key[0])))?;
            let again = reencode_v2(namespace, &value)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(again, value, "{} record changed on re-encode", namespace);
        }
    }

    #[test]
    fn prop_one_record_per_processed_tick(fixture in arb_epoch_fixture()) {
        let store = migrate(&fixture, 7)?;
        let ticks = fixture.tick_count();
        prop_assert_eq!(count(&store, Namespace::TickData), ticks);
        prop_assert_eq!(count(&store, Namespace::QuorumData), ticks);
        prop_assert_eq!(count(&store, Namespace::TickTransactionsStatus), ticks);
        prop_assert_eq!(
            count(&store, Namespace::Transaction),
            ticks * fixture.transactions_per_tick
        );
    }

    #[test]
    fn prop_last_tick_quorum_selects_range_end(fixture in arb_epoch_fixture()) {
        let store = migrate(&fixture, 5)?;
        let bytes = TargetStore::get(
            &store,
            &numeric_key(Namespace::LastTickQuorumDataPerEpochInterval, u64::from(fixture.epoch)),
        )
        .map_err(|e| TestCaseError::fail(e.to_string()))?
        .ok_or_else(|| TestCaseError::fail("last tick quorum record missing"))?;
        let record = LAST_TICK_QUORUM_V2
            .decode(&bytes)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(record.quorum_data_per_interval.len(), fixture.ranges.len());
        for (index, &(_, end)) in fixture.ranges.iter().enumerate() {
            let selected = record
                .quorum_data_per_interval
                .get(&(index as i32))
                .and_then(|q| q.quorum_tick_structure.as_ref())
                .map(|s| s.tick_number);
            prop_assert_eq!(selected, Some(end));
        }
    }
}
