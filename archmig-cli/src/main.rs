//! The `archmig` binary.

use std::process::ExitCode;

use archmig_cli::{logging, Cli};
use clap::Parser;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match archmig_cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "archmig failed");
            ExitCode::FAILURE
        }
    }
}
