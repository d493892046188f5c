//! Per-record v1 to v2 transforms over raw keys and values.

use std::collections::BTreeMap;

use archmig_core::keys::{decode_tick, numeric_key, singleton_key, text_key};
use archmig_core::records::{v1, v2};
use archmig_core::{ArchmigResult, CodecError, Namespace, ProtoCodec, RecordCodec};

use archmig_storage::archive::VOTE_SIGNATURE;

use crate::fold::Attributed;

pub const TICK_DATA_V1: ProtoCodec<v1::TickData> = ProtoCodec::new(Namespace::TickData);
pub const TICK_DATA_V2: ProtoCodec<v2::TickData> = ProtoCodec::new(Namespace::TickData);
pub const QUORUM_V1: ProtoCodec<v1::QuorumTickData> = ProtoCodec::new(Namespace::QuorumData);
pub const QUORUM_V2: ProtoCodec<v2::QuorumTickDataStored> = ProtoCodec::new(Namespace::QuorumData);
pub const LAST_TICK_QUORUM_V2: ProtoCodec<v2::LastTickQuorumDataPerEpochIntervals> =
    ProtoCodec::new(Namespace::LastTickQuorumDataPerEpochInterval);
pub const COMPUTORS_V2: ProtoCodec<v2::ComputorsList> = ProtoCodec::new(Namespace::ComputorList);
pub const INTERVALS_V2: ProtoCodec<v2::ProcessedTickIntervalsPerEpoch> =
    ProtoCodec::new(Namespace::ProcessedTickIntervals);
pub const PROCESSED_TICK_V2: ProtoCodec<v2::ProcessedTick> =
    ProtoCodec::new(Namespace::LastProcessedTick);
pub const TRANSACTION_V2: ProtoCodec<v2::Transaction> = ProtoCodec::new(Namespace::Transaction);
pub const TRANSACTION_STATUS_V2: ProtoCodec<v2::TransactionStatus> =
    ProtoCodec::new(Namespace::TransactionStatus);
pub const TICK_TRANSACTIONS_STATUS_V2: ProtoCodec<v2::TickTransactionsStatus> =
    ProtoCodec::new(Namespace::TickTransactionsStatus);

impl Attributed for v1::QuorumTickData {
    fn attribution(&self) -> Option<(u32, u32)> {
        self.quorum_tick_structure
            .as_ref()
            .map(|s| (s.epoch, s.tick_number))
    }
}

/// Re-encode one tick data record. Returns the converted record alongside
/// the new key and value so callers can collect its transaction ids.
pub fn tick_data(key: &[u8], value: &[u8]) -> ArchmigResult<(v2::TickData, Vec<u8>, Vec<u8>)> {
    let tick = decode_tick(Namespace::TickData, key)?;
    let record: v2::TickData = TICK_DATA_V1.decode(value)?.into();
    let encoded = TICK_DATA_V2.encode(&record)?;
    Ok((record, numeric_key(Namespace::TickData, u64::from(tick)), encoded))
}

/// Reduce one full quorum record to its stored form. The full record is
/// returned for the aggregation fold.
pub fn quorum_data(
    key: &[u8],
    value: &[u8],
) -> ArchmigResult<(v1::QuorumTickData, Vec<u8>, Vec<u8>)> {
    let tick = decode_tick(Namespace::QuorumData, key)?;
    let full = QUORUM_V1.decode(value)?;
    if full.quorum_tick_structure.is_none() {
        return Err(CodecError::Decode {
            namespace: Namespace::QuorumData,
            reason: format!("quorum data for tick {} has no tick structure", tick),
        }
        .into());
    }
    let stored = v2::QuorumTickDataStored::from(&full);
    let encoded = QUORUM_V2.encode(&stored)?;
    Ok((full, numeric_key(Namespace::QuorumData, u64::from(tick)), encoded))
}

/// Build the per-epoch last-tick quorum record from the selected records.
pub fn last_tick_quorum_data(
    epoch: u32,
    selected: BTreeMap<usize, v1::QuorumTickData>,
) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let mut record = v2::LastTickQuorumDataPerEpochIntervals::default();
    for (interval, quorum) in selected {
        let interval = i32::try_from(interval).map_err(|_| CodecError::Encode {
            namespace: Namespace::LastTickQuorumDataPerEpochInterval,
            reason: format!("interval index {} does not fit in 32 bits", interval),
        })?;
        record
            .quorum_data_per_interval
            .insert(interval, quorum.into());
    }
    let key = numeric_key(Namespace::LastTickQuorumDataPerEpochInterval, u64::from(epoch));
    Ok((key, LAST_TICK_QUORUM_V2.encode(&record)?))
}

pub fn computors(epoch: u32, computors: v1::Computors) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let list = v2::ComputorsList::from(computors);
    Ok((
        numeric_key(Namespace::ComputorList, u64::from(epoch)),
        COMPUTORS_V2.encode(&list)?,
    ))
}

pub fn processed_tick_intervals(
    intervals: v1::ProcessedTickIntervalsPerEpoch,
) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let key = numeric_key(Namespace::ProcessedTickIntervals, u64::from(intervals.epoch));
    let record = v2::ProcessedTickIntervalsPerEpoch::from(intervals);
    Ok((key, INTERVALS_V2.encode(&record)?))
}

/// The v2 store of an epoch keeps its own last processed tick as a singleton.
pub fn last_processed_tick(epoch: u32, tick: u32) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let record = v2::ProcessedTick {
        tick_number: tick,
        epoch,
    };
    Ok((
        singleton_key(Namespace::LastProcessedTick),
        PROCESSED_TICK_V2.encode(&record)?,
    ))
}

pub fn transaction(tx: v1::Transaction) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let key = text_key(Namespace::Transaction, &tx.tx_id);
    let record = v2::Transaction::from(tx);
    Ok((key, TRANSACTION_V2.encode(&record)?))
}

pub fn transaction_status(
    status: v1::TransactionStatus,
) -> ArchmigResult<(v2::TransactionStatus, Vec<u8>, Vec<u8>)> {
    let key = text_key(Namespace::TransactionStatus, &status.tx_id);
    let record = v2::TransactionStatus::from(status);
    let encoded = TRANSACTION_STATUS_V2.encode(&record)?;
    Ok((record, key, encoded))
}

/// Statuses of one tick, keyed by the tick widened to 64 bits.
pub fn tick_transactions_status(
    tick: u32,
    statuses: Vec<v2::TransactionStatus>,
) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    let record = v2::TickTransactionsStatus {
        transactions: statuses,
    };
    Ok((
        numeric_key(Namespace::TickTransactionsStatus, u64::from(tick)),
        TICK_TRANSACTIONS_STATUS_V2.encode(&record)?,
    ))
}

/// Decode a v2 value of `namespace` and encode it again.
///
/// Every record written to an epoch target must come back byte for byte.
pub fn reencode_v2(namespace: Namespace, value: &[u8]) -> Result<Vec<u8>, CodecError> {
    fn again<C: RecordCodec>(codec: &C, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        codec.encode(&codec.decode(value)?)
    }

    match namespace {
        Namespace::TickData => again(&TICK_DATA_V2, value),
        Namespace::QuorumData => again(&QUORUM_V2, value),
        Namespace::ComputorList => again(&COMPUTORS_V2, value),
        Namespace::Transaction => again(&TRANSACTION_V2, value),
        Namespace::TransactionStatus => again(&TRANSACTION_STATUS_V2, value),
        Namespace::TickTransactionsStatus => again(&TICK_TRANSACTIONS_STATUS_V2, value),
        Namespace::ProcessedTickIntervals => again(&INTERVALS_V2, value),
        Namespace::LastProcessedTick => again(&PROCESSED_TICK_V2, value),
        Namespace::LastTickQuorumDataPerEpochInterval => again(&LAST_TICK_QUORUM_V2, value),
        Namespace::TargetTickVoteSignature => again(&VOTE_SIGNATURE, value),
        other => Err(CodecError::Decode {
            namespace: other,
            reason: "namespace has no v2 epoch record".to_string(),
        }),
    }
}
