//! ARCHMIG Storage - store contracts and adapters
//!
//! Defines what the migration pipeline needs from a store and provides two
//! implementations: LMDB environments on disk and a shared in-memory map.

pub mod archive;
pub mod assembler;
pub mod lmdb;
pub mod memory;
pub mod traits;

pub use archive::ArchiveV1;
pub use assembler::assemble;
pub use lmdb::{LmdbStore, LmdbTargets};
pub use memory::{MemoryStore, MemoryTargets};
pub use traits::{
    Durability, SourceStore, StorageResult, TargetProvider, TargetStore, WriteBatch,
};
