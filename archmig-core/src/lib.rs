//! ARCHMIG Core - shared types for archive migration
//!
//! Namespaces and the key codec, per-epoch metadata, the v1 and v2 record
//! schemas, configuration and the error taxonomy. Every other crate in the
//! workspace depends on this one; it does no I/O beyond reading a config file.

pub mod config;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod records;

pub use config::{EpochSelection, MigratorConfig};
pub use error::{
    ArchmigError, ArchmigResult, CodecError, ConfigError, ConsistencyError, ResultExt, RunError,
    StorageError,
};
pub use keys::{KeyRange, KeyShape, Namespace, RecordId};
pub use metadata::{EpochMetadata, StoreMetadata, TickRange};
pub use records::{ProtoCodec, RecordCodec, U32LeCodec};
