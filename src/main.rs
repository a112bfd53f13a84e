use std::process::ExitCode;

use clap::Parser;

use flowfill::cli::{self, CliArgs};
use flowfill::logger;

fn main() -> ExitCode {
    // Session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
