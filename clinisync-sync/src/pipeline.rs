//! Fetch, join and synchronize in one call.

use chrono::NaiveDate;
use serde::Serialize;

use clinisync_core::settings::Settings;
use clinisync_core::types::PatientAggregate;

use crate::engine::{period_sums, SyncEngine, SyncReport};
use crate::error::{amount_err, SyncError};
use crate::joiner::{join, JoinOutcome};
use crate::source::{fetch_all, RecordSource};
use crate::table::client::ThrottledRetryClient;
use crate::table::TableService;

/// Fetch every stream from the cutoff date through `today` and join them.
pub fn collect<S: RecordSource>(
    source: &S,
    settings: &Settings,
    today: NaiveDate,
) -> Result<JoinOutcome, SyncError> {
    let range = settings.fetch_range(today);
    tracing::info!("fetching records from {} to {}", range.from, range.to);
    join(fetch_all(source, range)?)
}

/// One full synchronization run.
pub fn run<S: RecordSource, T: TableService>(
    source: &S,
    client: &mut ThrottledRetryClient<T>,
    settings: &Settings,
    today: NaiveDate,
) -> Result<SyncReport, SyncError> {
    let mut joined = collect(source, settings, today)?;
    let mut engine = SyncEngine::from_settings(client, settings);
    engine.synchronize(&mut joined.aggregates)
}

/// What a run would write for one patient, without touching the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub code: String,
    pub full_name: String,
    pub visits: usize,
    pub plan_total: Option<i64>,
    pub paid_total: i64,
    pub paid_days: usize,
}

pub fn summarize(
    aggregates: &[PatientAggregate],
    cutoff: NaiveDate,
) -> Result<Vec<PatientSummary>, SyncError> {
    aggregates
        .iter()
        .map(|agg| {
            let sums = period_sums(agg, cutoff)?;
            let plan_total = match &agg.plan {
                Some(plan) => plan
                    .discounted_total()
                    .map_err(|e| amount_err(agg.code(), e))?,
                None => None,
            };
            Ok(PatientSummary {
                code: agg.code().to_owned(),
                full_name: agg.full_name(),
                visits: agg.visited_count(),
                plan_total,
                paid_total: sums.values().sum(),
                paid_days: sums.len(),
            })
        })
        .collect()
}
