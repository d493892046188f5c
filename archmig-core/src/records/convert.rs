//! v1 to v2 record conversions.

use super::{v1, v2};

impl From<v1::TickData> for v2::TickData {
    fn from(t: v1::TickData) -> Self {
        v2::TickData {
            computor_index: t.computor_index,
            epoch: t.epoch,
            tick_number: t.tick_number,
            timestamp: t.timestamp,
            var_struct: t.var_struct,
            time_lock: t.time_lock,
            transaction_ids: t.transaction_ids,
            contract_fees: t.contract_fees,
            signature_hex: t.signature_hex,
        }
    }
}

impl From<&v1::QuorumTickStructure> for v2::QuorumTickStructure {
    fn from(s: &v1::QuorumTickStructure) -> Self {
        v2::QuorumTickStructure {
            epoch: s.epoch,
            tick_number: s.tick_number,
            timestamp: s.timestamp,
            prev_resource_testing_digest_hex: s.prev_resource_testing_digest_hex.clone(),
            prev_spectrum_digest_hex: s.prev_spectrum_digest_hex.clone(),
            prev_universe_digest_hex: s.prev_universe_digest_hex.clone(),
            prev_computer_digest_hex: s.prev_computer_digest_hex.clone(),
            tx_digest_hex: s.tx_digest_hex.clone(),
            prev_transaction_body_hex: s.prev_transaction_body_hex.clone(),
        }
    }
}

impl From<v1::QuorumDiff> for v2::QuorumDiff {
    fn from(d: v1::QuorumDiff) -> Self {
        v2::QuorumDiff {
            salted_resource_testing_digest_hex: d.salted_resource_testing_digest_hex,
            salted_spectrum_digest_hex: d.salted_spectrum_digest_hex,
            salted_universe_digest_hex: d.salted_universe_digest_hex,
            salted_computer_digest_hex: d.salted_computer_digest_hex,
            expected_next_tick_tx_digest_hex: d.expected_next_tick_tx_digest_hex,
            signature_hex: d.signature_hex,
            salted_transaction_body_hex: d.salted_transaction_body_hex,
        }
    }
}

/// Keeps every salted digest.
impl From<v1::QuorumTickData> for v2::QuorumTickData {
    fn from(q: v1::QuorumTickData) -> Self {
        v2::QuorumTickData {
            quorum_tick_structure: q.quorum_tick_structure.as_ref().map(Into::into),
            quorum_diff_per_computor: q
                .quorum_diff_per_computor
                .into_iter()
                .map(|(id, diff)| (id, diff.into()))
                .collect(),
        }
    }
}

/// Drops the salted digests; only the next-tick digest and signature remain.
impl From<&v1::QuorumTickData> for v2::QuorumTickDataStored {
    fn from(q: &v1::QuorumTickData) -> Self {
        v2::QuorumTickDataStored {
            quorum_tick_structure: q.quorum_tick_structure.as_ref().map(Into::into),
            quorum_diff_per_computor: q
                .quorum_diff_per_computor
                .iter()
                .map(|(id, diff)| {
                    (
                        *id,
                        v2::QuorumDiffStored {
                            expected_next_tick_tx_digest_hex: diff
                                .expected_next_tick_tx_digest_hex
                                .clone(),
                            signature_hex: diff.signature_hex.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl From<v1::Computors> for v2::Computors {
    fn from(c: v1::Computors) -> Self {
        v2::Computors {
            epoch: c.epoch,
            identities: c.identities,
            signature_hex: c.signature_hex,
        }
    }
}

/// A v1 epoch has exactly one computor list.
impl From<v1::Computors> for v2::ComputorsList {
    fn from(c: v1::Computors) -> Self {
        v2::ComputorsList {
            computors: vec![c.into()],
        }
    }
}

impl From<v1::Transaction> for v2::Transaction {
    fn from(t: v1::Transaction) -> Self {
        v2::Transaction {
            source_id: t.source_id,
            dest_id: t.dest_id,
            amount: t.amount,
            tick_number: t.tick_number,
            input_type: t.input_type,
            input_size: t.input_size,
            input_hex: t.input_hex,
            signature_hex: t.signature_hex,
            tx_id: t.tx_id,
        }
    }
}

impl From<v1::TransactionStatus> for v2::TransactionStatus {
    fn from(s: v1::TransactionStatus) -> Self {
        v2::TransactionStatus {
            tx_id: s.tx_id,
            money_flew: s.money_flew,
        }
    }
}

impl From<v1::ProcessedTickInterval> for v2::ProcessedTickInterval {
    fn from(i: v1::ProcessedTickInterval) -> Self {
        v2::ProcessedTickInterval {
            initial_processed_tick: i.initial_processed_tick,
            last_processed_tick: i.last_processed_tick,
        }
    }
}

impl From<v1::ProcessedTickIntervalsPerEpoch> for v2::ProcessedTickIntervalsPerEpoch {
    fn from(p: v1::ProcessedTickIntervalsPerEpoch) -> Self {
        v2::ProcessedTickIntervalsPerEpoch {
            epoch: p.epoch,
            intervals: p.intervals.into_iter().map(Into::into).collect(),
        }
    }
}
