//! `clinisync preview`: joined per-patient figures, read-only.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use clinisync_core::settings;
use clinisync_remote::ClinicCardsSource;
use clinisync_sync::{pipeline, DroppedRecords, PatientSummary};

/// Arguments for `clinisync preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PreviewJson {
    patients: Vec<PatientSummary>,
    dropped: DroppedRecords,
}

#[derive(Tabled)]
struct PreviewRow {
    #[tabled(rename = "code")]
    code: String,
    #[tabled(rename = "patient")]
    name: String,
    #[tabled(rename = "visits")]
    visits: usize,
    #[tabled(rename = "plan")]
    plan: String,
    #[tabled(rename = "paid")]
    paid: i64,
    #[tabled(rename = "paid days")]
    paid_days: usize,
}

impl PreviewArgs {
    pub fn run(self) -> Result<()> {
        let settings = settings::load().context("failed to load settings")?;
        settings
            .validate_source()
            .context("ClinicCards settings are incomplete")?;
        clinisync_daemon::init_tracing();

        let source = ClinicCardsSource::new(&settings.clinic_cards);
        let today = chrono::Local::now().date_naive();
        let joined =
            pipeline::collect(&source, &settings, today).context("failed to fetch records")?;
        let patients = pipeline::summarize(&joined.aggregates, settings.sync.cutoff_date)
            .context("failed to summarize records")?;

        if self.json {
            let output = PreviewJson {
                patients,
                dropped: joined.dropped,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        print_table(&patients, joined.dropped);
        Ok(())
    }
}

fn print_table(patients: &[PatientSummary], dropped: DroppedRecords) {
    if patients.is_empty() {
        println!("No patients found since the cutoff date.");
    } else {
        let rows: Vec<PreviewRow> = patients
            .iter()
            .map(|p| PreviewRow {
                code: p.code.clone(),
                name: p.full_name.clone(),
                visits: p.visits,
                plan: p.plan_total.map(|t| t.to_string()).unwrap_or_default(),
                paid: p.paid_total,
                paid_days: p.paid_days,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        let without_visits = patients.iter().filter(|p| p.visits == 0).count();
        println!(
            "{} patients, {} with no attended visits",
            patients.len(),
            without_visits
        );
    }

    if dropped.total() > 0 {
        let line = format!(
            "! dropped {} visits, {} payments, {} invoices without a known patient",
            dropped.visits, dropped.payments, dropped.invoices
        );
        println!("{}", line.yellow());
    }
}
