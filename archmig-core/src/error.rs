//! Error types for archive migration

use crate::Namespace;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Iteration failed: {reason}")]
    Iteration { reason: String },

    #[error("Read failed: {reason}")]
    Read { reason: String },

    #[error("Commit of {staged} staged records failed: {reason}")]
    Commit { staged: usize, reason: String },

    #[error("Compaction failed: {reason}")]
    Compaction { reason: String },

    #[error("Close failed: {reason}")]
    Close { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Record and key codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to decode {namespace} record: {reason}")]
    Decode { namespace: Namespace, reason: String },

    #[error("Failed to encode {namespace} record: {reason}")]
    Encode { namespace: Namespace, reason: String },

    #[error("Invalid {namespace} key of {len} bytes: {reason}")]
    InvalidKey {
        namespace: Namespace,
        len: usize,
        reason: String,
    },
}

/// Inconsistencies between the indices of the source store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("Tick {tick} of epoch {epoch} does not fall in any processed tick interval")]
    TickOutsideIntervals { epoch: u32, tick: u32 },

    #[error("No metadata found for epoch {epoch}")]
    EpochMetadataMissing { epoch: u32 },

    #[error("Epoch {epoch} has no processed tick ranges")]
    EmptyTickRanges { epoch: u32 },

    #[error("Record {id} is missing from {namespace}")]
    MissingRecord { namespace: Namespace, id: String },

    #[error("{label} record carries no epoch and tick")]
    Unattributed { label: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Errors raised by the run itself rather than by the data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Cannot {operation} while migrator is {state}")]
    InvalidState { operation: String, state: String },

    #[error("Migration cancelled after {committed} committed records")]
    Cancelled { committed: u64 },
}

/// Master error type for all migrator errors.
#[derive(Debug, Clone, Error)]
pub enum ArchmigError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ArchmigError>,
    },
}

impl ArchmigError {
    /// Wrap this error with a description of what was being done.
    pub fn context(self, context: impl Into<String>) -> Self {
        ArchmigError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every context layer stripped.
    pub fn root(&self) -> &ArchmigError {
        match self {
            ArchmigError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ArchmigError::Run(RunError::Cancelled { .. }))
    }
}

/// Result type alias for migrator operations.
pub type ArchmigResult<T> = Result<T, ArchmigError>;

/// Attach context to any result whose error converts into [`ArchmigError`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> ArchmigResult<T>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> ArchmigResult<T>;
}

impl<T, E: Into<ArchmigError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> ArchmigResult<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> ArchmigResult<T> {
        self.map_err(|e| e.into().context(f()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
