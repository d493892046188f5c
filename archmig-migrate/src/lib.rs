//! ARCHMIG Migrate - batched transcoding and epoch orchestration
//!
//! Range transcoding with bounded batches, interval attribution, the
//! aggregation fold for last-tick quorum data, and the [`Migrator`] that runs
//! the per-epoch steps against a source store and a target provider.

pub mod batch;
pub mod cancel;
mod epoch;
pub mod fold;
pub mod interval;
pub mod migrator;
pub mod report;
pub mod transcode;
pub mod transforms;

pub use batch::{BatchWriter, TranscodeOptions, TranscodeStats};
pub use cancel::CancellationToken;
pub use fold::{AggregationFold, Attributed, GreatestTick, Selector};
pub use interval::{IntervalIndex, IntervalIndexSet};
pub use migrator::{Migrator, MigratorState};
pub use report::{EpochReport, MigrationReport};
pub use transcode::{identity, transcode};
