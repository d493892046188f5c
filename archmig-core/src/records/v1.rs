//! Record schema of the single-store (v1) archive.

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

/// One computor's view of a tick, with every salted digest.
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

/// Full quorum record of a tick, every computor's digests included.
///
/// The migration decodes this full form and reduces it to
/// [`super::v2::QuorumTickDataStored`] itself rather than reading an already
/// reduced v1 record. The per-epoch last-tick quorum list is likewise
/// derived by folding these records, never copied from the archive.
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuorumTickData {
    #[prost(message, optional, tag = "1")]
    pub quorum_tick_structure: Option<QuorumTickStructure>,
    #[prost(btree_map = "uint32, message", tag = "2")]
    pub quorum_diff_per_computor: BTreeMap<u32, QuorumDiff>,
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

/// Global last processed tick, stored under the singleton key.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessedTick {
    #[prost(uint32, tag = "1")]
    pub tick_number: u32,
    #[prost(uint32, tag = "2")]
    pub epoch: u32,
}
