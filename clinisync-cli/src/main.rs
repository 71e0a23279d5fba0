//! clinisync: copy clinic patient records into the monthly report sheet.
//!
//! # Usage
//!
//! ```text
//! clinisync init
//! clinisync sync [--dry-run] [--json]
//! clinisync preview [--json]
//! clinisync daemon [--interval-minutes <N>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonArgs, init::InitArgs, preview::PreviewArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "clinisync",
    version,
    about = "Synchronize ClinicCards patient records into a Google Sheets report",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default ~/.clinisync/settings.yaml.
    Init(InitArgs),

    /// Fetch records and write them into the report sheet once.
    Sync(SyncArgs),

    /// Show the joined per-patient figures without touching the sheet.
    Preview(PreviewArgs),

    /// Run synchronization passes on a fixed interval until ctrl-c.
    Daemon(DaemonArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Preview(args) => args.run(),
        Commands::Daemon(args) => args.run(),
    }
}
