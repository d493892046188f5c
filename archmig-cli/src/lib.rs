//! # archmig-cli
//!
//! Command-line front end for the archive migrator.
//!
//! ## Commands
//!
//! - `archmig metadata` - Print the per-epoch metadata of the source store
//! - `archmig migrate` - Migrate one epoch, an epoch range or every epoch
//! - `archmig copy-namespaces` - Copy whole namespaces into a single store
//!
//! ## Configuration
//!
//! Settings are layered: built-in defaults, then the TOML file given with
//! `--config`, then environment variables and flags.
//!
//! - `ARCHMIG_CONFIG` - TOML configuration file
//! - `ARCHMIG_SOURCE` - v1 store directory (default: `storage/old`)
//! - `ARCHMIG_TARGET` - root of the per-epoch v2 stores (default: `storage/new`)
//! - `ARCHMIG_BATCH_SIZE` - records per commit (default: 10000)

pub mod commands;
pub mod logging;

use std::path::PathBuf;

use archmig_core::{ArchmigError, ConfigError, MigratorConfig};
use clap::{Parser, Subcommand};
use thiserror::Error;

/// Errors surfaced by the binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Migration(#[from] ArchmigError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// Archive migrator - split a v1 archive into per-epoch v2 stores.
#[derive(Debug, Parser)]
#[command(name = "archmig")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, short = 'c', env = "ARCHMIG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the v1 store.
    #[arg(long, env = "ARCHMIG_SOURCE", global = true)]
    pub source: Option<PathBuf>,

    /// Root directory of the per-epoch v2 stores.
    #[arg(long, env = "ARCHMIG_TARGET", global = true)]
    pub target: Option<PathBuf>,

    /// Records staged before each commit.
    #[arg(long, env = "ARCHMIG_BATCH_SIZE", global = true)]
    pub batch_size: Option<usize>,

    /// Compact each target store after its epoch is migrated.
    #[arg(long, env = "ARCHMIG_COMPACT", global = true)]
    pub compact: bool,

    /// Epochs above this number must carry a target tick vote signature.
    #[arg(long, env = "ARCHMIG_SIGNATURE_EPOCH_THRESHOLD", global = true)]
    pub signature_epoch_threshold: Option<u32>,

    /// LMDB map size in megabytes.
    #[arg(long, env = "ARCHMIG_MAP_SIZE_MB", global = true)]
    pub map_size_mb: Option<usize>,

    /// Log line format.
    #[arg(
        long,
        value_enum,
        env = "ARCHMIG_LOG_FORMAT",
        default_value = "pretty",
        global = true
    )]
    pub log_format: logging::LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then the config
    /// file, then flags and environment.
    pub fn settings(&self) -> CliResult<MigratorConfig> {
        let mut config = match &self.config {
            Some(path) => MigratorConfig::from_path(path)?,
            None => MigratorConfig::default(),
        };
        if let Some(source) = &self.source {
            config.source_path = source.clone();
        }
        if let Some(target) = &self.target {
            config.target_path = target.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.compact {
            config.compact_after_migrate = true;
        }
        if let Some(threshold) = self.signature_epoch_threshold {
            config.signature_epoch_threshold = threshold;
        }
        if let Some(map_size_mb) = self.map_size_mb {
            config.map_size_mb = map_size_mb;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the per-epoch metadata of the source store.
    Metadata(commands::metadata::MetadataArgs),
    /// Migrate epochs into their own target stores.
    Migrate(commands::migrate::MigrateArgs),
    /// Copy whole namespaces unchanged into one store.
    CopyNamespaces(commands::copy::CopyArgs),
}

/// Run the parsed command line.
pub fn run(cli: Cli) -> CliResult<()> {
    let config = cli.settings()?;
    match cli.command {
        Commands::Metadata(args) => commands::metadata::execute(&args, &config),
        Commands::Migrate(args) => commands::migrate::execute(&args, &config),
        Commands::CopyNamespaces(args) => commands::copy::execute(&args, &config),
    }
}
