//! Subcommand implementations.

pub mod copy;
pub mod metadata;
pub mod migrate;

use archmig_core::{MigratorConfig, ResultExt};
use archmig_storage::LmdbStore;

use crate::CliResult;

/// Open the configured v1 store read-only.
fn open_source(config: &MigratorConfig) -> CliResult<LmdbStore> {
    let source = LmdbStore::open_read_only(&config.source_path, config.map_size_bytes())
        .context("opening source store")?;
    Ok(source)
}
