use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

mod anchors;
mod check;
mod expand;
mod terminal;

use anchors::Anchors;
use check::Check;
use clap::ArgAction;
use docref::storage::CONFIG_FILE;
use expand::Expand;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The root of the documentation source tree
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<ExitCode> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Check(Check::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Check includes and cross-references (default)
    Check(Check),

    /// Print a document with its includes expanded
    Expand(Expand),

    /// List every anchor in the corpus
    Anchors(Anchors),

    /// Write a default configuration file
    Init,
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<ExitCode> {
        match self {
            Self::Check(command) => command.run(root),
            Self::Expand(command) => command.run(root).map(|()| ExitCode::SUCCESS),
            Self::Anchors(command) => command.run(root).map(|()| ExitCode::SUCCESS),
            Self::Init => init(&root).map(|()| ExitCode::SUCCESS),
        }
    }
}

#[instrument]
fn init(root: &Path) -> anyhow::Result<()> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("Already initialized (found existing {CONFIG_FILE})");
    }

    docref::Config::default()
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

    println!("Initialized documentation corpus in {}", root.display());
    println!("  Created: {CONFIG_FILE}");
    println!();
    println!("Next steps:");
    println!("  docref check");

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn check_is_the_default_command() {
        let cli = Cli::try_parse_from(["docref", "--root", "docs", "-vv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.root, PathBuf::from("docs"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(Cli::try_parse_from(["docref", "check", "--output", "xml"]).is_err());
        assert!(Cli::try_parse_from(["docref", "check", "--output", "jsonl"]).is_ok());
    }

    #[test]
    fn init_writes_default_config_once() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();

        init(root).expect("init command should succeed");
        let config = docref::Config::load(&root.join(CONFIG_FILE)).unwrap();
        assert_eq!(config, docref::Config::default());

        let error = init(root).unwrap_err();
        assert!(error.to_string().starts_with("Already initialized"));
    }

    #[test]
    fn fatal_check_yields_a_failing_exit_code() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::write(root.join("index.txt"), ".. include:: /gone.txt\n").unwrap();

        let status = Command::Check(Check::default())
            .run(root)
            .expect("check command should succeed");
        assert_eq!(status, ExitCode::from(2));
    }
}
