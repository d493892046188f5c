//! Namespace-prefixed key system for the archive stores.
//!
//! Every key is `tag ++ id-encoding`. The tag is a single byte naming the
//! record category; the id encoding depends on the namespace's [`KeyShape`]:
//!
//! - Numeric ids are always 8-byte big-endian, so byte order equals numeric
//!   order. 32-bit ticks and epochs are widened before encoding.
//! - String ids are raw bytes.
//! - Composite ids are the identity bytes followed by an 8-byte big-endian tick.
//! - Singleton namespaces hold one record keyed by the bare tag.
//!
//! Range scans over a namespace rely on the ordering above: the aggregation
//! fold sees ticks in ascending order without sorting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::metadata::TickRange;

/// Width of every numeric id in bytes.
pub const NUMERIC_ID_WIDTH: usize = 8;

/// Upper bound sentinel for numeric ids.
pub const UPPER_BOUND_NUMERIC: u64 = u64::MAX;

/// Upper bound sentinel for transaction ids (60 lowercase characters).
pub const UPPER_BOUND_TRANSACTION: &str =
    "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz";

/// Upper bound sentinel for identities (60 uppercase characters).
pub const UPPER_BOUND_IDENTITY: &str =
    "ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ";

/// Logical record category within an archive store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    TickData,
    QuorumData,
    ComputorList,
    Transaction,
    LastProcessedTick,
    LastProcessedTickPerEpoch,
    SkippedTicksInterval,
    IdentityTransferTransactions,
    ChainDigest,
    ProcessedTickIntervals,
    TickTransactionsStatus,
    TransactionStatus,
    StoreDigest,
    EmptyTicksPerEpoch,
    LastTickQuorumDataPerEpochInterval,
    TargetTickVoteSignature,
}

/// Layout of the id part of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// The key is the tag alone.
    Singleton,
    /// 8-byte big-endian unsigned integer.
    FixedWidthNumeric,
    /// Raw string bytes; `upper` sorts after every valid id.
    VariableLengthString { upper: &'static str },
    /// Raw string bytes followed by an 8-byte big-endian integer.
    Composite { upper: &'static str },
}

impl Namespace {
    pub const ALL: [Namespace; 16] = [
        Namespace::TickData,
        Namespace::QuorumData,
        Namespace::ComputorList,
        Namespace::Transaction,
        Namespace::LastProcessedTick,
        Namespace::LastProcessedTickPerEpoch,
        Namespace::SkippedTicksInterval,
        Namespace::IdentityTransferTransactions,
        Namespace::ChainDigest,
        Namespace::ProcessedTickIntervals,
        Namespace::TickTransactionsStatus,
        Namespace::TransactionStatus,
        Namespace::StoreDigest,
        Namespace::EmptyTicksPerEpoch,
        Namespace::LastTickQuorumDataPerEpochInterval,
        Namespace::TargetTickVoteSignature,
    ];

    /// Namespaces that are not split per epoch and are copied as a whole
    /// by the single-store copy path.
    pub const GLOBAL: [Namespace; 7] = [
        Namespace::LastProcessedTick,
        Namespace::LastProcessedTickPerEpoch,
        Namespace::SkippedTicksInterval,
        Namespace::IdentityTransferTransactions,
        Namespace::ChainDigest,
        Namespace::StoreDigest,
        Namespace::EmptyTicksPerEpoch,
    ];

    /// The single-byte tag prefixing every key of this namespace.
    pub fn tag(self) -> u8 {
        match self {
            Namespace::TickData => 0x00,
            Namespace::QuorumData => 0x01,
            Namespace::ComputorList => 0x02,
            Namespace::Transaction => 0x03,
            Namespace::LastProcessedTick => 0x04,
            Namespace::LastProcessedTickPerEpoch => 0x05,
            Namespace::SkippedTicksInterval => 0x06,
            Namespace::IdentityTransferTransactions => 0x07,
            Namespace::ChainDigest => 0x08,
            Namespace::ProcessedTickIntervals => 0x09,
            Namespace::TickTransactionsStatus => 0x10,
            Namespace::TransactionStatus => 0x11,
            Namespace::StoreDigest => 0x12,
            Namespace::EmptyTicksPerEpoch => 0x13,
            Namespace::LastTickQuorumDataPerEpochInterval => 0x14,
            Namespace::TargetTickVoteSignature => 0x15,
        }
    }

    /// Look up a namespace by its tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.tag() == tag)
    }

    pub fn shape(self) -> KeyShape {
        match self {
            Namespace::LastProcessedTick | Namespace::SkippedTicksInterval => KeyShape::Singleton,
            Namespace::Transaction | Namespace::TransactionStatus => {
                KeyShape::VariableLengthString {
                    upper: UPPER_BOUND_TRANSACTION,
                }
            }
            Namespace::IdentityTransferTransactions => KeyShape::Composite {
                upper: UPPER_BOUND_IDENTITY,
            },
            Namespace::TickData
            | Namespace::QuorumData
            | Namespace::ComputorList
            | Namespace::LastProcessedTickPerEpoch
            | Namespace::ChainDigest
            | Namespace::ProcessedTickIntervals
            | Namespace::TickTransactionsStatus
            | Namespace::StoreDigest
            | Namespace::EmptyTicksPerEpoch
            | Namespace::LastTickQuorumDataPerEpochInterval
            | Namespace::TargetTickVoteSignature => KeyShape::FixedWidthNumeric,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Namespace::TickData => "tick_data",
            Namespace::QuorumData => "quorum_data",
            Namespace::ComputorList => "computor_list",
            Namespace::Transaction => "transaction",
            Namespace::LastProcessedTick => "last_processed_tick",
            Namespace::LastProcessedTickPerEpoch => "last_processed_tick_per_epoch",
            Namespace::SkippedTicksInterval => "skipped_ticks_interval",
            Namespace::IdentityTransferTransactions => "identity_transfer_transactions",
            Namespace::ChainDigest => "chain_digest",
            Namespace::ProcessedTickIntervals => "processed_tick_intervals",
            Namespace::TickTransactionsStatus => "tick_transactions_status",
            Namespace::TransactionStatus => "transaction_status",
            Namespace::StoreDigest => "store_digest",
            Namespace::EmptyTicksPerEpoch => "empty_ticks_per_epoch",
            Namespace::LastTickQuorumDataPerEpochInterval => {
                "last_tick_quorum_data_per_epoch_interval"
            }
            Namespace::TargetTickVoteSignature => "target_tick_vote_signature",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|ns| ns.name() == normalized)
            .ok_or_else(|| format!("unknown namespace '{}'", s))
    }
}

/// Decoded id part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Singleton,
    Numeric(u64),
    Text(String),
    Composite { text: String, number: u64 },
}

impl RecordId {
    pub fn tick(tick: u32) -> Self {
        RecordId::Numeric(u64::from(tick))
    }

    pub fn epoch(epoch: u32) -> Self {
        RecordId::Numeric(u64::from(epoch))
    }

    /// The numeric id, for numeric and composite keys.
    pub fn number(&self) -> Option<u64> {
        match self {
            RecordId::Numeric(n) | RecordId::Composite { number: n, .. } => Some(*n),
            _ => None,
        }
    }

    fn matches(&self, shape: KeyShape) -> bool {
        matches!(
            (self, shape),
            (RecordId::Singleton, KeyShape::Singleton)
                | (RecordId::Numeric(_), KeyShape::FixedWidthNumeric)
                | (RecordId::Text(_), KeyShape::VariableLengthString { .. })
                | (RecordId::Composite { .. }, KeyShape::Composite { .. })
        )
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Singleton => f.write_str("<singleton>"),
            RecordId::Numeric(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
            RecordId::Composite { text, number } => write!(f, "{}/{}", text, number),
        }
    }
}

/// Encode a key for `namespace` with the given id.
///
/// The id variant must match the namespace's shape; a mismatch is a
/// programming error and is only checked in debug builds.
pub fn encode_key(namespace: Namespace, id: &RecordId) -> Vec<u8> {
    debug_assert!(
        id.matches(namespace.shape()),
        "id {:?} does not fit the key shape of {}",
        id,
        namespace
    );
    match id {
        RecordId::Singleton => singleton_key(namespace),
        RecordId::Numeric(n) => numeric_key(namespace, *n),
        RecordId::Text(s) => text_key(namespace, s),
        RecordId::Composite { text, number } => composite_key(namespace, text, *number),
    }
}

pub fn singleton_key(namespace: Namespace) -> Vec<u8> {
    vec![namespace.tag()]
}

pub fn numeric_key(namespace: Namespace, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + NUMERIC_ID_WIDTH);
    key.push(namespace.tag());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub fn text_key(namespace: Namespace, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.len());
    key.push(namespace.tag());
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn composite_key(namespace: Namespace, text: &str, number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + text.len() + NUMERIC_ID_WIDTH);
    key.push(namespace.tag());
    key.extend_from_slice(text.as_bytes());
    key.extend_from_slice(&number.to_be_bytes());
    key
}

/// Decode the id part of a key belonging to `namespace`.
pub fn decode_id(namespace: Namespace, key: &[u8]) -> Result<RecordId, CodecError> {
    let invalid = |reason: &str| CodecError::InvalidKey {
        namespace,
        len: key.len(),
        reason: reason.to_string(),
    };

    match key.first() {
        Some(&tag) if tag == namespace.tag() => {}
        Some(_) => return Err(invalid("tag does not match namespace")),
        None => return Err(invalid("empty key")),
    }
    let body = &key[1..];

    match namespace.shape() {
        KeyShape::Singleton => {
            if body.is_empty() {
                Ok(RecordId::Singleton)
            } else {
                Err(invalid("singleton key carries an id"))
            }
        }
        KeyShape::FixedWidthNumeric => {
            let bytes: [u8; NUMERIC_ID_WIDTH] = body
                .try_into()
                .map_err(|_| invalid("numeric id is not 8 bytes"))?;
            Ok(RecordId::Numeric(u64::from_be_bytes(bytes)))
        }
        KeyShape::VariableLengthString { .. } => {
            let text = std::str::from_utf8(body).map_err(|_| invalid("id is not valid UTF-8"))?;
            Ok(RecordId::Text(text.to_string()))
        }
        KeyShape::Composite { .. } => {
            if body.len() < NUMERIC_ID_WIDTH {
                return Err(invalid("composite id shorter than its numeric suffix"));
            }
            let (text, number) = body.split_at(body.len() - NUMERIC_ID_WIDTH);
            let text = std::str::from_utf8(text).map_err(|_| invalid("id is not valid UTF-8"))?;
            let number: [u8; NUMERIC_ID_WIDTH] = number
                .try_into()
                .map_err(|_| invalid("numeric suffix is not 8 bytes"))?;
            Ok(RecordId::Composite {
                text: text.to_string(),
                number: u64::from_be_bytes(number),
            })
        }
    }
}

/// Decode a tick number from a numeric key.
pub fn decode_tick(namespace: Namespace, key: &[u8]) -> Result<u32, CodecError> {
    let id = decode_id(namespace, key)?;
    id.number()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| CodecError::InvalidKey {
            namespace,
            len: key.len(),
            reason: format!("id {} is not a 32-bit tick", id),
        })
}

/// Exclusive upper bound covering every key of `namespace`.
pub fn namespace_upper_bound(namespace: Namespace) -> Vec<u8> {
    match namespace.shape() {
        KeyShape::Singleton => vec![namespace.tag(), 0x00],
        KeyShape::FixedWidthNumeric => numeric_key(namespace, UPPER_BOUND_NUMERIC),
        KeyShape::VariableLengthString { upper } => text_key(namespace, upper),
        KeyShape::Composite { upper } => composite_key(namespace, upper, UPPER_BOUND_NUMERIC),
    }
}

/// Half-open key interval `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub lower: Vec<u8>,
    pub upper: Vec<u8>,
}

impl KeyRange {
    pub fn new(lower: Vec<u8>, upper: Vec<u8>) -> Self {
        Self { lower, upper }
    }

    /// Every key of a namespace and nothing else.
    pub fn namespace(namespace: Namespace) -> Self {
        Self {
            lower: vec![namespace.tag()],
            upper: namespace_upper_bound(namespace),
        }
    }

    /// Keys of a tick-numbered namespace with ticks in the inclusive `range`.
    pub fn ticks(namespace: Namespace, range: TickRange) -> Self {
        debug_assert_eq!(namespace.shape(), KeyShape::FixedWidthNumeric);
        Self {
            lower: numeric_key(namespace, u64::from(range.start)),
            upper: numeric_key(namespace, u64::from(range.end) + 1),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.lower.as_slice() && key < self.upper.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.lower >= self.upper
    }
}

// =============================================================================
// TESTS
// =============================================================================
