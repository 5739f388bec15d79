//! Lineup — keep the creator catalog and the remote store in step.
//!
//! # Usage
//!
//! ```text
//! lineup sync [--catalog DIR] [--group NAME] [--delay-ms N] [--json] [--verbose]
//! lineup catalog list [--catalog DIR]
//! lineup catalog check [--catalog DIR]
//! lineup config show
//! ```
//!
//! Exit codes: 0 when no record failed, 1 when at least one record failed,
//! 2 when the run could not start (bad arguments, config or catalog), 130
//! when SIGINT or SIGTERM stopped `sync` before the end of the catalog.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{catalog::CatalogCommand, config::ConfigCommand, sync::SyncArgs};

/// Exit code for errors raised before any record is processed.
const EXIT_SETUP_ERROR: i32 = 2;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "lineup",
    version,
    about = "Reconcile the creator catalog against the remote store",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, update and tag remote entities to match the catalog.
    Sync(SyncArgs),

    /// Inspect catalog files without touching the remote store.
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Inspect effective settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<i32> = match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Catalog { command } => commands::catalog::run(command).map(|()| 0),
        Commands::Config { command } => commands::config::run(command).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(EXIT_SETUP_ERROR);
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
