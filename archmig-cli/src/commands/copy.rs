//! Copy command - copy whole namespaces into a single store.

use std::path::PathBuf;

use archmig_core::{MigratorConfig, Namespace, ResultExt};
use archmig_migrate::Migrator;
use archmig_storage::{LmdbStore, LmdbTargets, TargetStore};
use clap::Args;
use tracing::info;

use super::open_source;
use crate::CliResult;

#[derive(Debug, Args)]
pub struct CopyArgs {
    /// Store the namespaces are copied into.
    #[arg(long)]
    pub destination: PathBuf,

    /// Namespace to copy, repeatable. Defaults to every global namespace.
    #[arg(long = "namespace")]
    pub namespaces: Vec<Namespace>,
}

impl CopyArgs {
    pub fn namespaces(&self) -> Vec<Namespace> {
        if self.namespaces.is_empty() {
            Namespace::GLOBAL.to_vec()
        } else {
            self.namespaces.clone()
        }
    }
}

pub fn execute(args: &CopyArgs, config: &MigratorConfig) -> CliResult<()> {
    let source = open_source(config)?;
    let targets = LmdbTargets::new(&config.target_path, config.map_size_bytes());
    let mut migrator = Migrator::open(source, targets, config.clone())?;

    let destination = LmdbStore::create(&args.destination, config.map_size_bytes())
        .context("opening destination store")?;
    let namespaces = args.namespaces();
    info!(
        destination = %args.destination.display(),
        namespaces = namespaces.len(),
        "copying namespaces"
    );
    let copied = migrator.copy_namespaces(&destination, &namespaces)?;
    destination.close().context("closing destination store")?;

    for (namespace, records) in &copied {
        println!("{}: {}", namespace, records);
    }
    Ok(())
}
