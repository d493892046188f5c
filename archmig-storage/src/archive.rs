//! Typed reads over a v1 archive.

use std::collections::BTreeMap;

use archmig_core::keys::{decode_id, numeric_key, text_key, RecordId};
use archmig_core::records::v1;
use archmig_core::{
    ArchmigResult, CodecError, KeyRange, Namespace, ProtoCodec, RecordCodec, U32LeCodec,
};

use crate::traits::SourceStore;

pub const COMPUTORS: ProtoCodec<v1::Computors> = ProtoCodec::new(Namespace::ComputorList);
pub const INTERVALS: ProtoCodec<v1::ProcessedTickIntervalsPerEpoch> =
    ProtoCodec::new(Namespace::ProcessedTickIntervals);
pub const TRANSACTIONS: ProtoCodec<v1::Transaction> = ProtoCodec::new(Namespace::Transaction);
pub const TRANSACTION_STATUSES: ProtoCodec<v1::TransactionStatus> =
    ProtoCodec::new(Namespace::TransactionStatus);
pub const LAST_TICK_PER_EPOCH: U32LeCodec = U32LeCodec::new(Namespace::LastProcessedTickPerEpoch);
pub const VOTE_SIGNATURE: U32LeCodec = U32LeCodec::new(Namespace::TargetTickVoteSignature);

/// Read-side view of a v1 store with decoding built in.
pub struct ArchiveV1<'a, S> {
    store: &'a S,
}

impl<'a, S: SourceStore> ArchiveV1<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn computors(&self, epoch: u32) -> ArchmigResult<Option<v1::Computors>> {
        self.get(&COMPUTORS, &numeric_key(Namespace::ComputorList, u64::from(epoch)))
    }

    /// Every per-epoch interval list, ordered by epoch key.
    pub fn processed_tick_intervals(&self) -> ArchmigResult<Vec<v1::ProcessedTickIntervalsPerEpoch>> {
        let mut out = Vec::new();
        self.store.scan(
            &KeyRange::namespace(Namespace::ProcessedTickIntervals),
            |_, value| {
                out.push(INTERVALS.decode(value)?);
                Ok::<(), archmig_core::ArchmigError>(())
            },
        )?;
        Ok(out)
    }

    pub fn processed_tick_intervals_for(
        &self,
        epoch: u32,
    ) -> ArchmigResult<Option<v1::ProcessedTickIntervalsPerEpoch>> {
        self.get(
            &INTERVALS,
            &numeric_key(Namespace::ProcessedTickIntervals, u64::from(epoch)),
        )
    }

    /// Last processed tick of every epoch that has one.
    pub fn last_processed_ticks_per_epoch(&self) -> ArchmigResult<BTreeMap<u32, u32>> {
        let mut out = BTreeMap::new();
        self.store.scan(
            &KeyRange::namespace(Namespace::LastProcessedTickPerEpoch),
            |key, value| {
                let epoch = epoch_from_key(Namespace::LastProcessedTickPerEpoch, key)?;
                out.insert(epoch, LAST_TICK_PER_EPOCH.decode(value)?);
                Ok::<(), archmig_core::ArchmigError>(())
            },
        )?;
        Ok(out)
    }

    pub fn transaction(&self, tx_id: &str) -> ArchmigResult<Option<v1::Transaction>> {
        self.get(&TRANSACTIONS, &text_key(Namespace::Transaction, tx_id))
    }

    pub fn transaction_status(&self, tx_id: &str) -> ArchmigResult<Option<v1::TransactionStatus>> {
        self.get(
            &TRANSACTION_STATUSES,
            &text_key(Namespace::TransactionStatus, tx_id),
        )
    }

    pub fn target_tick_vote_signature(&self, epoch: u32) -> ArchmigResult<Option<u32>> {
        self.get(
            &VOTE_SIGNATURE,
            &numeric_key(Namespace::TargetTickVoteSignature, u64::from(epoch)),
        )
    }

    fn get<C: RecordCodec>(&self, codec: &C, key: &[u8]) -> ArchmigResult<Option<C::Value>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn epoch_from_key(namespace: Namespace, key: &[u8]) -> Result<u32, CodecError> {
    match decode_id(namespace, key)? {
        RecordId::Numeric(n) => u32::try_from(n).map_err(|_| CodecError::InvalidKey {
            namespace,
            len: key.len(),
            reason: format!("epoch {} does not fit in 32 bits", n),
        }),
        other => Err(CodecError::InvalidKey {
            namespace,
            len: key.len(),
            reason: format!("expected a numeric epoch id, got {}", other),
        }),
    }
}
