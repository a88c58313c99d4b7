//! Demonstration binary for the `gray` photon-transport engine. Does not
//! parse real scene/material/isotope files; every subcommand builds a
//! representative scene in-process.

use std::process::ExitCode;

use clap::Parser;
use gray_cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match gray_cli::run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
