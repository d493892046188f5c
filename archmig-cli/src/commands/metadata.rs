//! Metadata command - print what the source store holds per epoch.

use archmig_core::{MigratorConfig, ResultExt, StoreMetadata};
use archmig_storage::assemble;
use clap::Args;
use tracing::info;

use super::open_source;
use crate::CliResult;

#[derive(Debug, Args)]
pub struct MetadataArgs {
    /// Print JSON instead of the indented listing.
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &MetadataArgs, config: &MigratorConfig) -> CliResult<()> {
    let source = open_source(config)?;
    let metadata = assemble(&source).context("loading store metadata")?;
    info!(
        source = %config.source_path.display(),
        epochs = metadata.len(),
        "store metadata loaded"
    );
    println!("{}", render(&metadata, args.json)?);
    Ok(())
}

fn render(metadata: &StoreMetadata, json: bool) -> CliResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(metadata)?)
    } else {
        Ok(metadata.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archmig_core::{EpochMetadata, TickRange};

    #[test]
    fn test_render_formats() {
        let mut metadata = StoreMetadata::new();
        metadata.insert(EpochMetadata {
            epoch: 3,
            processed_tick_ranges: vec![TickRange::new(1, 50)],
            last_processed_tick: 50,
        });

        let text = render(&metadata, false).expect("render should succeed");
        assert!(text.contains("Epoch: 3"));

        let json = render(&metadata, true).expect("render should succeed");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert!(value.is_object());
    }
}
