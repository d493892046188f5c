//! Migrate command - move epochs into their own target stores.

use archmig_core::{EpochSelection, MigratorConfig};
use archmig_migrate::{MigrationReport, Migrator};
use archmig_storage::LmdbTargets;
use clap::{ArgGroup, Args};
use tracing::info;

use super::open_source;
use crate::CliResult;

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .args(["epoch", "range", "all"])
))]
pub struct MigrateArgs {
    /// Migrate a single epoch.
    #[arg(long)]
    pub epoch: Option<u32>,

    /// Migrate every epoch from START to END, both inclusive.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub range: Option<Vec<u32>>,

    /// Migrate every epoch found in the source store.
    #[arg(long)]
    pub all: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl MigrateArgs {
    pub fn selection(&self) -> EpochSelection {
        match (&self.epoch, self.range.as_deref()) {
            (Some(epoch), _) => EpochSelection::Epoch(*epoch),
            (None, Some([start, end])) => EpochSelection::Range {
                start: *start,
                end: *end,
            },
            _ => EpochSelection::All,
        }
    }
}

pub fn execute(args: &MigrateArgs, config: &MigratorConfig) -> CliResult<()> {
    let selection = args.selection();
    selection.validate()?;

    let source = open_source(config)?;
    let targets = LmdbTargets::new(&config.target_path, config.map_size_bytes());
    let mut migrator = Migrator::open(source, targets, config.clone())?;

    info!(
        source = %config.source_path.display(),
        target = %config.target_path.display(),
        batch_size = config.batch_size,
        selection = ?selection,
        "starting migration"
    );
    let result = migrator.run(selection);
    let report = migrator.into_report();
    print_report(&report, args.json)?;
    result?;
    Ok(())
}

/// Completed epochs are printed even when the run stopped early.
fn print_report(report: &MigrationReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for epoch in &report.epochs {
        println!(
            "Epoch {}: {} records in {} ms{}",
            epoch.epoch,
            epoch.total(),
            epoch.duration_ms().unwrap_or_default(),
            if epoch.compacted { ", compacted" } else { "" }
        );
        for (namespace, written) in &epoch.records {
            println!("  - {}: {}", namespace, written);
        }
    }
    Ok(())
}
