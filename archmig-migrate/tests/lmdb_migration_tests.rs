//! Migration between LMDB environments on disk.

use archmig_core::keys::numeric_key;
use archmig_core::{KeyRange, MigratorConfig, Namespace};
use archmig_migrate::{Migrator, MigratorState};
use archmig_storage::{LmdbStore, LmdbTargets, MemoryTargets, TargetStore};
use archmig_test_utils::assertions::{dump, dump_all};
use archmig_test_utils::fixtures::{ArchiveBuilder, EpochFixture};
use tempfile::TempDir;

const MAP_SIZE: usize = 64 * 1024 * 1024;

fn archive() -> ArchiveBuilder {
    ArchiveBuilder::new()
        .epoch_fixture(&EpochFixture::new(150, &[(1, 40), (60, 75)]).with_transactions_per_tick(2))
        .epoch(160, &[(100, 130)])
        .global_records(130, 160)
}

/// Write `builder` into a fresh environment and reopen it read-only.
fn lmdb_source(dir: &TempDir, builder: &ArchiveBuilder) -> LmdbStore {
    let path = dir.path().join("old");
    let writer = LmdbStore::create(&path, MAP_SIZE).expect("create should succeed");
    builder.write_to(&writer).expect("seeding should succeed");
    writer.close().expect("close should succeed");
    LmdbStore::open_read_only(&path, MAP_SIZE).expect("read-only open should succeed")
}

fn config(dir: &TempDir, compact: bool) -> MigratorConfig {
    MigratorConfig {
        source_path: dir.path().join("old"),
        target_path: dir.path().join("new"),
        batch_size: 16,
        compact_after_migrate: compact,
        ..MigratorConfig::default()
    }
}

#[test]
fn test_lmdb_migration_matches_in_memory_migration() {
    let dir = TempDir::new().expect("tempdir should succeed");
    let builder = archive();
    let source = lmdb_source(&dir, &builder);
    let config = config(&dir, false);
    let targets = LmdbTargets::new(&config.target_path, MAP_SIZE);

    let mut migrator =
        Migrator::open(source, targets.clone(), config.clone()).expect("open should succeed");
    assert_eq!(migrator.metadata().epoch_numbers(), vec![150, 160]);
    migrator.migrate_all().expect("migration should succeed");
    assert_eq!(migrator.state(), &MigratorState::Done);

    let memory_targets = MemoryTargets::new();
    let mut reference = Migrator::open(builder.build(), memory_targets.clone(), config)
        .expect("open should succeed");
    reference.migrate_all().expect("migration should succeed");

    for epoch in [150u32, 160] {
        let on_disk = LmdbStore::open_read_only(targets.epoch_path(epoch), MAP_SIZE)
            .expect("target should reopen");
        let in_memory = memory_targets
            .epoch(epoch)
            .expect("in-memory target should exist");
        assert_eq!(dump_all(&on_disk), dump_all(&in_memory), "epoch {}", epoch);
    }
}

#[test]
fn test_source_is_left_untouched() {
    let dir = TempDir::new().expect("tempdir should succeed");
    let builder = archive();
    let source = lmdb_source(&dir, &builder);
    let before = dump_all(&source);
    let config = config(&dir, false);
    let targets = LmdbTargets::new(&config.target_path, MAP_SIZE);

    let mut migrator = Migrator::open(source, targets, config).expect("open should succeed");
    migrator.migrate_epoch(150).expect("migration should succeed");
    drop(migrator);

    let source = LmdbStore::open_read_only(dir.path().join("old"), MAP_SIZE)
        .expect("source should reopen");
    assert_eq!(dump_all(&source), before);
    assert_eq!(source.entry_count().expect("count should succeed"), builder.len() as u64);
}

#[test]
fn test_compacted_target_keeps_contents() {
    let dir = TempDir::new().expect("tempdir should succeed");
    let source = lmdb_source(&dir, &archive());
    let config = config(&dir, true);
    let targets = LmdbTargets::new(&config.target_path, MAP_SIZE);

    let mut migrator =
        Migrator::open(source, targets.clone(), config).expect("open should succeed");
    migrator.migrate_epoch(160).expect("migration should succeed");
    assert!(migrator.report().epoch(160).is_some_and(|r| r.compacted));

    let target = LmdbStore::open_read_only(targets.epoch_path(160), MAP_SIZE)
        .expect("compacted target should reopen");
    assert_eq!(
        dump(&target, &KeyRange::namespace(Namespace::TickData)).len(),
        31
    );
    assert!(target
        .get(&numeric_key(Namespace::TargetTickVoteSignature, 160))
        .expect("get should succeed")
        .is_some());
}

#[test]
fn test_failed_epoch_leaves_no_compacted_copy() {
    let dir = TempDir::new().expect("tempdir should succeed");
    let builder = archive().without(&numeric_key(Namespace::TargetTickVoteSignature, 160));
    let source = lmdb_source(&dir, &builder);
    let config = config(&dir, true);
    let targets = LmdbTargets::new(&config.target_path, MAP_SIZE);

    // Leftover of an earlier run that died while compacting.
    let epoch_dir = targets.epoch_path(160);
    std::fs::create_dir_all(&epoch_dir).expect("mkdir should succeed");
    let stale = epoch_dir.join("data.mdb.compacted");
    std::fs::write(&stale, b"partial").expect("write should succeed");

    let mut migrator =
        Migrator::open(source, targets.clone(), config).expect("open should succeed");
    migrator
        .migrate_epoch(160)
        .expect_err("missing vote signature should fail");
    assert!(matches!(
        migrator.state(),
        MigratorState::Failed { epoch: Some(160), .. }
    ));
    assert!(!stale.exists());

    // The environment was closed cleanly and reopens.
    let target = LmdbStore::open_read_only(&epoch_dir, MAP_SIZE).expect("target should reopen");
    assert!(dump(&target, &KeyRange::namespace(Namespace::TickData)).is_empty());
}

#[test]
fn test_copy_namespaces_into_lmdb() {
    let dir = TempDir::new().expect("tempdir should succeed");
    let builder = archive();
    let source = lmdb_source(&dir, &builder);
    let config = config(&dir, false);
    let targets = LmdbTargets::new(&config.target_path, MAP_SIZE);
    let mut migrator = Migrator::open(source, targets, config).expect("open should succeed");

    let destination =
        LmdbStore::create(dir.path().join("global"), MAP_SIZE).expect("create should succeed");
    let copied = migrator
        .copy_namespaces(&destination, &[Namespace::ChainDigest, Namespace::StoreDigest])
        .expect("copy should succeed");
    assert_eq!(copied.values().sum::<u64>(), 6);
    assert_eq!(
        dump(&destination, &KeyRange::namespace(Namespace::ChainDigest)),
        dump(&builder.build(), &KeyRange::namespace(Namespace::ChainDigest))
    );
}
