//! Record codecs.
//!
//! Values are opaque bytes to the storage layer. A [`RecordCodec`] is the
//! per-namespace decode/encode pair the migration steps use to turn those bytes
//! into typed records and back.

use std::marker::PhantomData;

use crate::error::CodecError;
use crate::keys::Namespace;

mod convert;
pub mod v1;
pub mod v2;

/// Decode/encode pair for the values of one namespace.
pub trait RecordCodec {
    type Value;

    fn namespace(&self) -> Namespace;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;
}

/// Protobuf codec for any `prost` message.
pub struct ProtoCodec<M> {
    namespace: Namespace,
    _message: PhantomData<fn() -> M>,
}

impl<M> ProtoCodec<M> {
    pub const fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            _message: PhantomData,
        }
    }
}

impl<M> Clone for ProtoCodec<M> {
    fn clone(&self) -> Self {
        Self::new(self.namespace)
    }
}

impl<M> Copy for ProtoCodec<M> {}

impl<M: prost::Message + Default> RecordCodec for ProtoCodec<M> {
    type Value = M;

    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn decode(&self, bytes: &[u8]) -> Result<M, CodecError> {
        M::decode(bytes).map_err(|e| CodecError::Decode {
            namespace: self.namespace,
            reason: e.to_string(),
        })
    }

    fn encode(&self, value: &M) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(value.encoded_len());
        value.encode(&mut buf).map_err(|e| CodecError::Encode {
            namespace: self.namespace,
            reason: e.to_string(),
        })?;
        Ok(buf)
    }
}

/// Fixed-width little-endian `u32` values (vote signatures, per-epoch ticks).
#[derive(Debug, Clone, Copy)]
pub struct U32LeCodec {
    namespace: Namespace,
}

impl U32LeCodec {
    pub const fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }
}

impl RecordCodec for U32LeCodec {
    type Value = u32;

    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn decode(&self, bytes: &[u8]) -> Result<u32, CodecError> {
        let raw: [u8; 4] = bytes.try_into().map_err(|_| CodecError::Decode {
            namespace: self.namespace,
            reason: format!("expected 4 bytes, got {}", bytes.len()),
        })?;
        Ok(u32::from_le_bytes(raw))
    }

    fn encode(&self, value: &u32) -> Result<Vec<u8>, CodecError> {
        Ok(value.to_le_bytes().to_vec())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_proto_codec_roundtrip_tick_data() {
        let codec = ProtoCodec::<v2::TickData>::new(Namespace::TickData);
        let tick = v2::TickData {
            epoch: 120,
            tick_number: 15_000_000,
            transaction_ids: vec!["a".repeat(60), "b".repeat(60)],
            contract_fees: vec![1, -2, 3],
            signature_hex: "ff".into(),
            ..Default::default()
        };
        let bytes = codec.encode(&tick).expect("encode should succeed");
        let back = codec.decode(&bytes).expect("decode should succeed");
        assert_eq!(back, tick);
    }

    #[test]
    fn test_proto_codec_decode_error_names_namespace() {
        let codec = ProtoCodec::<v1::QuorumTickData>::new(Namespace::QuorumData);
        let err = codec
            .decode(&[0xFF, 0xFF, 0xFF])
            .expect_err("garbage should not decode");
        assert!(matches!(
            err,
            CodecError::Decode {
                namespace: Namespace::QuorumData,
                ..
            }
        ));
    }

    #[test]
    fn test_btree_map_encoding_is_deterministic() {
        let codec = ProtoCodec::<v2::QuorumTickDataStored>::new(Namespace::QuorumData);
        let mut diffs = BTreeMap::new();
        for id in [9u32, 1, 5, 3] {
            diffs.insert(
                id,
                v2::QuorumDiffStored {
                    expected_next_tick_tx_digest_hex: format!("d{}", id),
                    signature_hex: format!("s{}", id),
                },
            );
        }
        let record = v2::QuorumTickDataStored {
            quorum_tick_structure: None,
            quorum_diff_per_computor: diffs,
        };
        let first = codec.encode(&record).expect("encode should succeed");
        let second = codec
            .encode(&record.clone())
            .expect("encode should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_u32_le_codec() {
        let codec = U32LeCodec::new(Namespace::TargetTickVoteSignature);
        assert_eq!(codec.encode(&0x0102_0304).expect("encode should succeed"), vec![4, 3, 2, 1]);
        assert_eq!(codec.decode(&[4, 3, 2, 1]).expect("decode should succeed"), 0x0102_0304);
        assert!(codec.decode(&[1, 2]).is_err());
    }
}
