//! ARCHMIG Test Utilities
//!
//! Shared test infrastructure for the ARCHMIG workspace:
//! - A builder for synthetic v1 archives
//! - Proptest generators for tick ranges and epoch layouts
//! - Store dumps and error assertions

pub use archmig_core::{
    ArchmigError, ArchmigResult, ConsistencyError, EpochMetadata, KeyRange, Namespace,
    StoreMetadata, TickRange,
};
pub use archmig_storage::{MemoryStore, MemoryTargets};

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Synthetic v1 archives.

    use std::collections::BTreeMap;

    use archmig_core::keys::{composite_key, numeric_key, singleton_key, text_key};
    use archmig_core::records::v1;
    use archmig_core::{ArchmigResult, Namespace, ProtoCodec, RecordCodec};
    use archmig_storage::archive::{
        COMPUTORS, INTERVALS, LAST_TICK_PER_EPOCH, TRANSACTIONS, TRANSACTION_STATUSES,
        VOTE_SIGNATURE,
    };
    use archmig_storage::{Durability, MemoryStore, TargetStore, WriteBatch};

    pub const TICK_DATA: ProtoCodec<v1::TickData> = ProtoCodec::new(Namespace::TickData);
    pub const QUORUM_DATA: ProtoCodec<v1::QuorumTickData> = ProtoCodec::new(Namespace::QuorumData);
    pub const PROCESSED_TICK: ProtoCodec<v1::ProcessedTick> =
        ProtoCodec::new(Namespace::LastProcessedTick);

    /// Layout of one epoch in a synthetic archive.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EpochFixture {
        pub epoch: u32,
        /// Inclusive processed tick ranges.
        pub ranges: Vec<(u32, u32)>,
        pub transactions_per_tick: usize,
        /// Defaults to the end of the last range. `None` leaves the record out.
        pub last_processed_tick: Option<u32>,
    }

    impl EpochFixture {
        pub fn new(epoch: u32, ranges: &[(u32, u32)]) -> Self {
            Self {
                epoch,
                ranges: ranges.to_vec(),
                transactions_per_tick: 1,
                last_processed_tick: ranges.last().map(|&(_, end)| end),
            }
        }

        pub fn with_transactions_per_tick(mut self, count: usize) -> Self {
            self.transactions_per_tick = count;
            self
        }

        pub fn without_last_processed_tick(mut self) -> Self {
            self.last_processed_tick = None;
            self
        }

        pub fn ticks(&self) -> impl Iterator<Item = u32> + '_ {
            self.ranges.iter().flat_map(|&(start, end)| start..=end)
        }

        pub fn tick_count(&self) -> usize {
            self.ticks().count()
        }
    }

    /// 60-character lowercase transaction id, unique per epoch, tick and slot.
    pub fn tx_id(epoch: u32, tick: u32, slot: usize) -> String {
        let seed = format!("e{}t{}s{}", epoch, tick, slot)
            .chars()
            .map(|c| match c.to_digit(10) {
                Some(d) => char::from(b'a' + d as u8),
                None => c,
            })
            .collect::<String>();
        format!("{:x<60}", seed)
    }

    /// 60-character uppercase identity.
    pub fn identity(n: usize) -> String {
        let seed: String = n
            .to_string()
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| char::from(b'A' + d as u8))
            .collect();
        format!("{:X<60}", seed)
    }

    pub fn quorum_record(epoch: u32, tick: u32) -> v1::QuorumTickData {
        let diff = |computor: u32| v1::QuorumDiff {
            salted_resource_testing_digest_hex: format!("rt{}", computor),
            salted_spectrum_digest_hex: format!("sp{}", computor),
            salted_universe_digest_hex: format!("un{}", computor),
            salted_computer_digest_hex: format!("co{}", computor),
            expected_next_tick_tx_digest_hex: format!("next{}-{}", tick, computor),
            signature_hex: format!("sig{}-{}", tick, computor),
            salted_transaction_body_hex: format!("tb{}", computor),
        };
        v1::QuorumTickData {
            quorum_tick_structure: Some(v1::QuorumTickStructure {
                epoch,
                tick_number: tick,
                timestamp: u64::from(tick) * 1_000,
                tx_digest_hex: format!("txd{}", tick),
                ..Default::default()
            }),
            quorum_diff_per_computor: BTreeMap::from([(0, diff(0)), (1, diff(1))]),
        }
    }

    /// Builds a v1 archive record by record.
    ///
    /// Every epoch gets computors, its interval list, its last processed tick,
    /// a vote signature, and for each tick: tick data, quorum data, the
    /// tick's transactions and their statuses.
    #[derive(Debug, Clone, Default)]
    pub struct ArchiveBuilder {
        records: BTreeMap<Vec<u8>, Vec<u8>>,
    }

    impl ArchiveBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn epoch(self, epoch: u32, ranges: &[(u32, u32)]) -> Self {
            self.epoch_fixture(&EpochFixture::new(epoch, ranges))
        }

        pub fn epoch_fixture(mut self, fixture: &EpochFixture) -> Self {
            let epoch = fixture.epoch;
            self.encode(
                numeric_key(Namespace::ComputorList, u64::from(epoch)),
                &COMPUTORS,
                &v1::Computors {
                    epoch,
                    identities: (0..4).map(identity).collect(),
                    signature_hex: format!("computors{}", epoch),
                },
            );
            self.encode(
                numeric_key(Namespace::ProcessedTickIntervals, u64::from(epoch)),
                &INTERVALS,
                &v1::ProcessedTickIntervalsPerEpoch {
                    epoch,
                    intervals: fixture
                        .ranges
                        .iter()
                        .map(|&(start, end)| v1::ProcessedTickInterval {
                            initial_processed_tick: start,
                            last_processed_tick: end,
                        })
                        .collect(),
                },
            );
            if let Some(tick) = fixture.last_processed_tick {
                self.encode(
                    numeric_key(Namespace::LastProcessedTickPerEpoch, u64::from(epoch)),
                    &LAST_TICK_PER_EPOCH,
                    &tick,
                );
            }
            self.encode(
                numeric_key(Namespace::TargetTickVoteSignature, u64::from(epoch)),
                &VOTE_SIGNATURE,
                &(0xC0DE_0000 | epoch),
            );

            for tick in fixture.ticks() {
                let tx_ids: Vec<String> = (0..fixture.transactions_per_tick)
                    .map(|slot| tx_id(epoch, tick, slot))
                    .collect();
                for (slot, id) in tx_ids.iter().enumerate() {
                    self.encode(
                        text_key(Namespace::Transaction, id),
                        &TRANSACTIONS,
                        &v1::Transaction {
                            source_id: identity(slot),
                            dest_id: identity(slot + 1),
                            amount: i64::from(tick) + slot as i64,
                            tick_number: tick,
                            input_hex: "00ff".to_string(),
                            signature_hex: format!("txsig{}", id),
                            tx_id: id.clone(),
                            ..Default::default()
                        },
                    );
                    self.encode(
                        text_key(Namespace::TransactionStatus, id),
                        &TRANSACTION_STATUSES,
                        &v1::TransactionStatus {
                            tx_id: id.clone(),
                            money_flew: slot % 2 == 0,
                        },
                    );
                }
                self.encode(
                    numeric_key(Namespace::TickData, u64::from(tick)),
                    &TICK_DATA,
                    &v1::TickData {
                        computor_index: tick % 676,
                        epoch,
                        tick_number: tick,
                        timestamp: u64::from(tick) * 1_000,
                        transaction_ids: tx_ids,
                        contract_fees: vec![i64::from(tick)],
                        signature_hex: format!("ticksig{}", tick),
                        ..Default::default()
                    },
                );
                self.encode(
                    numeric_key(Namespace::QuorumData, u64::from(tick)),
                    &QUORUM_DATA,
                    &quorum_record(epoch, tick),
                );
            }
            self
        }

        /// Records of the namespaces that are not split per epoch.
        pub fn global_records(mut self, last_tick: u32, last_epoch: u32) -> Self {
            self.encode(
                singleton_key(Namespace::LastProcessedTick),
                &PROCESSED_TICK,
                &v1::ProcessedTick {
                    tick_number: last_tick,
                    epoch: last_epoch,
                },
            );
            self.records
                .insert(singleton_key(Namespace::SkippedTicksInterval), vec![0x0A, 0x00]);
            for tick in [1u64, 2, 3] {
                self.records
                    .insert(numeric_key(Namespace::ChainDigest, tick), vec![tick as u8; 32]);
                self.records
                    .insert(numeric_key(Namespace::StoreDigest, tick), vec![!(tick as u8); 32]);
            }
            self.records.insert(
                composite_key(Namespace::IdentityTransferTransactions, &identity(7), 2),
                b"transfers".to_vec(),
            );
            self.records.insert(
                numeric_key(Namespace::EmptyTicksPerEpoch, u64::from(last_epoch)),
                vec![0, 0, 0, 5],
            );
            self
        }

        pub fn put(mut self, key: Vec<u8>, value: Vec<u8>) -> Self {
            self.records.insert(key, value);
            self
        }

        /// Drop a record, for archives with a broken index.
        pub fn without(mut self, key: &[u8]) -> Self {
            self.records.remove(key);
            self
        }

        pub fn len(&self) -> usize {
            self.records.len()
        }

        pub fn is_empty(&self) -> bool {
            self.records.is_empty()
        }

        pub fn build(&self) -> MemoryStore {
            let store = MemoryStore::new();
            for (key, value) in &self.records {
                store
                    .put(key.clone(), value.clone())
                    .unwrap_or_else(|e| panic!("fixture record should store: {}", e));
            }
            store
        }

        /// Write the archive into any writable store, e.g. an LMDB source
        /// that is reopened read-only afterwards.
        pub fn write_to<T: TargetStore>(&self, target: &T) -> ArchmigResult<()> {
            let mut batch = WriteBatch::new();
            for (key, value) in &self.records {
                batch.set(key.clone(), value.clone());
            }
            target.commit(&batch, Durability::Durable)?;
            Ok(())
        }

        fn encode<C: RecordCodec>(&mut self, key: Vec<u8>, codec: &C, value: &C::Value) {
            let bytes = codec
                .encode(value)
                .unwrap_or_else(|e| panic!("fixture record should encode: {}", e));
            self.records.insert(key, bytes);
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest generators for archive layouts.

    use proptest::prelude::*;

    use super::fixtures::EpochFixture;
    use archmig_core::{Namespace, TickRange};

    pub fn arb_namespace() -> impl Strategy<Value = Namespace> {
        prop::sample::select(Namespace::ALL.to_vec())
    }

    /// Ascending, non-overlapping tick ranges starting at `base`.
    pub fn arb_tick_ranges(base: u32, max_ranges: usize) -> impl Strategy<Value = Vec<(u32, u32)>> {
        prop::collection::vec((0u32..5, 0u32..8), 1..=max_ranges).prop_map(move |gaps| {
            let mut next = base;
            gaps.into_iter()
                .map(|(gap, len)| {
                    let start = next + gap;
                    let end = start + len;
                    next = end + 1;
                    (start, end)
                })
                .collect()
        })
    }

    pub fn arb_tick_range() -> impl Strategy<Value = TickRange> {
        (0u32..10_000, 0u32..100).prop_map(|(start, len)| TickRange::new(start, start + len))
    }

    /// A small epoch at or below the signature threshold.
    pub fn arb_epoch_fixture() -> impl Strategy<Value = EpochFixture> {
        (1u32..100, arb_tick_ranges(1, 3), 0usize..3).prop_map(|(epoch, ranges, txs)| {
            EpochFixture::new(epoch, &ranges).with_transactions_per_tick(txs)
        })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Store dumps and error assertions.

    use archmig_core::{ArchmigError, ArchmigResult, ConsistencyError, KeyRange, StorageError};
    use archmig_storage::SourceStore;

    /// Every pair of `store` in `range`, in key order.
    pub fn dump<S: SourceStore>(store: &S, range: &KeyRange) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        store
            .scan(range, |key, value| {
                out.push((key.to_vec(), value.to_vec()));
                Ok::<(), StorageError>(())
            })
            .unwrap_or_else(|e| panic!("dump should succeed: {}", e));
        out
    }

    /// Every pair of `store`.
    pub fn dump_all<S: SourceStore>(store: &S) -> Vec<(Vec<u8>, Vec<u8>)> {
        dump(store, &KeyRange::new(vec![0x00], vec![0xFF]))
    }

    #[track_caller]
    pub fn assert_consistency_error<T: std::fmt::Debug>(
        result: &ArchmigResult<T>,
        expected: &ConsistencyError,
    ) {
        match result {
            Err(e) => match e.root() {
                ArchmigError::Consistency(found) => assert_eq!(found, expected),
                other => panic!("Expected Consistency error {:?}, got: {:?}", expected, other),
            },
            Ok(v) => panic!("Expected Consistency error {:?}, got Ok({:?})", expected, v),
        }
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &ArchmigResult<T>) {
        match result {
            Err(e) if e.is_cancelled() => {}
            other => panic!("Expected cancellation, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
