//! `clinisync sync`: one synchronization run against the live services.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use clinisync_core::settings;
use clinisync_remote::{ClinicCardsSource, SheetsTable};
use clinisync_sync::{pipeline, DryRunTable, RecordedWrite, SyncReport, ThrottledRetryClient};

/// Arguments for `clinisync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Read from the sheet but record writes instead of sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    dry_run: bool,
    report: &'a SyncReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    writes: Option<&'a [RecordedWrite]>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let settings = settings::load().context("failed to load settings")?;
        settings.validate().context("settings are incomplete")?;
        clinisync_daemon::init_tracing();

        let source = ClinicCardsSource::new(&settings.clinic_cards);
        let sheet = SheetsTable::new(&settings.sheet);
        let today = chrono::Local::now().date_naive();

        if self.dry_run {
            let mut client = ThrottledRetryClient::from_settings(DryRunTable::new(sheet), &settings);
            let report =
                pipeline::run(&source, &mut client, &settings, today).context("dry-run sync failed")?;
            let writes = client.into_inner().into_writes();
            self.print(&report, Some(&writes))
        } else {
            let mut client = ThrottledRetryClient::from_settings(sheet, &settings);
            let report = pipeline::run(&source, &mut client, &settings, today).context("sync failed")?;
            self.print(&report, None)
        }
    }

    fn print(&self, report: &SyncReport, writes: Option<&[RecordedWrite]>) -> Result<()> {
        if self.json {
            let output = SyncOutput {
                dry_run: self.dry_run,
                report,
                writes,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        println!(
            "{prefix}{} {} inserted, {} updated, {} skipped",
            "✓".green(),
            report.inserted,
            report.updated,
            report.skipped
        );
        println!(
            "  {} period cells, {} payer count cells",
            report.period_cells, report.count_cells
        );
        if let Some(code) = &report.last_committed {
            println!("  last patient written: {}", code.bold());
        }

        for write in writes.unwrap_or_default() {
            match write {
                RecordedWrite::InsertRow { position, values } => {
                    let filled: Vec<&str> = values
                        .iter()
                        .map(String::as_str)
                        .filter(|v| !v.is_empty())
                        .collect();
                    println!("  +  row {position}: {}", filled.join(" | "));
                }
                RecordedWrite::UpdateCells { cells } => {
                    let cells: Vec<String> = cells
                        .iter()
                        .map(|c| format!("({},{})={}", c.row, c.column, c.value))
                        .collect();
                    println!("  ~  {}", cells.join(", "));
                }
            }
        }
        Ok(())
    }
}
