//! `docref`: check the cross-references and includes of a documentation tree.

use std::process::ExitCode;

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<ExitCode> {
    Cli::parse().run()
}
