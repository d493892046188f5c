//! Record schema of the per-epoch (v2) archive.
//!
//! Most messages keep their v1 field layout. The differences are the reduced
//! per-tick quorum record, the computor list wrapper, the per-tick status
//! grouping and the derived last-tick quorum data.

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, prost::Message)]
pub struct TickData {
    #[prost(uint32, tag = "1")]
    pub computor_index: u32,
    #[prost(uint32, tag = "2")]
    pub epoch: u32,
    #[prost(uint32, tag = "3")]
    pub tick_number: u32,
    #[prost(uint64, tag = "4")]
    pub timestamp: u64,
    #[prost(bytes = "vec", tag = "5")]
    pub var_struct: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub time_lock: Vec<u8>,
    #[prost(string, repeated, tag = "7")]
    pub transaction_ids: Vec<String>,
    #[prost(int64, repeated, tag = "8")]
    pub contract_fees: Vec<i64>,
    #[prost(string, tag = "9")]
    pub signature_hex: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumTickStructure {
    #[prost(uint32, tag = "1")]
    pub epoch: u32,
    #[prost(uint32, tag = "2")]
    pub tick_number: u32,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
    #[prost(string, tag = "4")]
    pub prev_resource_testing_digest_hex: String,
    #[prost(string, tag = "5")]
    pub prev_spectrum_digest_hex: String,
    #[prost(string, tag = "6")]
    pub prev_universe_digest_hex: String,
    #[prost(string, tag = "7")]
    pub prev_computer_digest_hex: String,
    #[prost(string, tag = "8")]
    pub tx_digest_hex: String,
    #[prost(string, tag = "9")]
    pub prev_transaction_body_hex: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumDiff {
    #[prost(string, tag = "1")]
    pub salted_resource_testing_digest_hex: String,
    #[prost(string, tag = "2")]
    pub salted_spectrum_digest_hex: String,
    #[prost(string, tag = "3")]
    pub salted_universe_digest_hex: String,
    #[prost(string, tag = "4")]
    pub salted_computer_digest_hex: String,
    #[prost(string, tag = "5")]
    pub expected_next_tick_tx_digest_hex: String,
    #[prost(string, tag = "6")]
    pub signature_hex: String,
    #[prost(string, tag = "7")]
    pub salted_transaction_body_hex: String,
}

/// Full quorum record; only kept for the last tick of each interval.
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumTickData {
    #[prost(message, optional, tag = "1")]
    pub quorum_tick_structure: Option<QuorumTickStructure>,
    #[prost(btree_map = "uint32, message", tag = "2")]
    pub quorum_diff_per_computor: BTreeMap<u32, QuorumDiff>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumDiffStored {
    #[prost(string, tag = "1")]
    pub expected_next_tick_tx_digest_hex: String,
    #[prost(string, tag = "2")]
    pub signature_hex: String,
}

/// Per-tick quorum record as stored in v2.
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumTickDataStored {
    #[prost(message, optional, tag = "1")]
    pub quorum_tick_structure: Option<QuorumTickStructure>,
    #[prost(btree_map = "uint32, message", tag = "2")]
    pub quorum_diff_per_computor: BTreeMap<u32, QuorumDiffStored>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LastTickQuorumDataPerEpochIntervals {
    #[prost(btree_map = "int32, message", tag = "1")]
    pub quorum_data_per_interval: BTreeMap<i32, QuorumTickData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Computors {
    #[prost(uint32, tag = "1")]
    pub epoch: u32,
    #[prost(string, repeated, tag = "2")]
    pub identities: Vec<String>,
    #[prost(string, tag = "3")]
    pub signature_hex: String,
}

/// An epoch may carry several computor lists in v2.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ComputorsList {
    #[prost(message, repeated, tag = "1")]
    pub computors: Vec<Computors>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Transaction {
    #[prost(string, tag = "1")]
    pub source_id: String,
    #[prost(string, tag = "2")]
    pub dest_id: String,
    #[prost(int64, tag = "3")]
    pub amount: i64,
    #[prost(uint32, tag = "4")]
    pub tick_number: u32,
    #[prost(uint32, tag = "5")]
    pub input_type: u32,
    #[prost(uint32, tag = "6")]
    pub input_size: u32,
    #[prost(string, tag = "7")]
    pub input_hex: String,
    #[prost(string, tag = "8")]
    pub signature_hex: String,
    #[prost(string, tag = "9")]
    pub tx_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TransactionStatus {
    #[prost(string, tag = "1")]
    pub tx_id: String,
    #[prost(bool, tag = "2")]
    pub money_flew: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TickTransactionsStatus {
    #[prost(message, repeated, tag = "1")]
    pub transactions: Vec<TransactionStatus>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessedTickInterval {
    #[prost(uint32, tag = "1")]
    pub initial_processed_tick: u32,
    #[prost(uint32, tag = "2")]
    pub last_processed_tick: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessedTickIntervalsPerEpoch {
    #[prost(uint32, tag = "1")]
    pub epoch: u32,
    #[prost(message, repeated, tag = "2")]
    pub intervals: Vec<ProcessedTickInterval>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessedTick {
    #[prost(uint32, tag = "1")]
    pub tick_number: u32,
    #[prost(uint32, tag = "2")]
    pub epoch: u32,
}
