//! Per-patient reconciliation of aggregates against the report table.
//!
//! Patients are processed strictly in the order given. For each one the engine
//! locates its row (or inserts one right below the previously processed
//! patient), rewrites the computed fields, then writes one batch of per-day
//! payment sums. Distinct-payer counts per day are written once at the end.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use clinisync_core::settings::{Layout, PatientMatch, Settings};
use clinisync_core::types::{truncate_amount, CellUpdate, PatientAggregate};

use crate::error::{amount_err, SyncError};
use crate::position_cache::PositionCache;
use crate::table::client::ThrottledRetryClient;
use crate::table::{Lookup, TableService};

/// Summary of one `synchronize` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    /// Patients without visits.
    pub skipped: usize,
    pub period_cells: usize,
    pub count_cells: usize,
    /// Code of the last patient whose writes all completed.
    pub last_committed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Existing,
    New,
}

struct PatientOutcome {
    state: RowState,
    period_cells: usize,
    paid_on: Vec<NaiveDate>,
}

pub struct SyncEngine<'c, T> {
    client: &'c mut ThrottledRetryClient<T>,
    layout: Layout,
    cutoff: NaiveDate,
    positions: PositionCache,
}

impl<'c, T: TableService> SyncEngine<'c, T> {
    pub fn new(client: &'c mut ThrottledRetryClient<T>, layout: &Layout, cutoff: NaiveDate) -> Self {
        Self {
            client,
            layout: layout.clone(),
            cutoff,
            positions: PositionCache::new(layout),
        }
    }

    pub fn from_settings(client: &'c mut ThrottledRetryClient<T>, settings: &Settings) -> Self {
        Self::new(client, &settings.layout, settings.sync.cutoff_date)
    }

    pub fn positions(&self) -> &PositionCache {
        &self.positions
    }

    /// Reconcile every aggregate, assigning `row_position` as rows are found.
    ///
    /// Stops at the first fatal error; patients before it are fully written.
    pub fn synchronize(&mut self, aggregates: &mut [PatientAggregate]) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut previous_row: Option<u32> = None;
        let mut payers: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();

        for agg in aggregates.iter_mut() {
            if agg.visits.is_empty() {
                tracing::debug!("skipping patient {} without visits", agg.code());
                report.skipped += 1;
                continue;
            }

            let code = agg.code().to_owned();
            let outcome = match self.sync_patient(agg, previous_row) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(
                        "sync aborted at patient {}: {} (last committed: {})",
                        code,
                        err,
                        report.last_committed.as_deref().unwrap_or("none")
                    );
                    return Err(SyncError::PatientFailed {
                        code,
                        last_committed: report.last_committed,
                        source: Box::new(err),
                    });
                }
            };

            match outcome.state {
                RowState::New => report.inserted += 1,
                RowState::Existing => report.updated += 1,
            }
            report.period_cells += outcome.period_cells;
            for date in outcome.paid_on {
                payers.entry(date).or_default().insert(code.clone());
            }
            previous_row = agg.row_position;
            report.last_committed = Some(code);
        }

        report.count_cells = self.write_payer_counts(&payers)?;

        tracing::info!(
            "sync finished: {} inserted, {} updated, {} skipped, {} period cells, {} count cells",
            report.inserted,
            report.updated,
            report.skipped,
            report.period_cells,
            report.count_cells
        );
        Ok(report)
    }

    fn sync_patient(
        &mut self,
        agg: &mut PatientAggregate,
        previous_row: Option<u32>,
    ) -> Result<PatientOutcome, SyncError> {
        // Everything that can reject the patient is resolved before any write.
        let sums = period_sums(agg, self.cutoff)?;
        let plan_total = plan_total_cell(agg)?;
        let visits = visits_cell(agg.visited_count());
        let mut columns = Vec::with_capacity(sums.len());
        for (date, amount) in &sums {
            let at = self.positions.coordinate_for_date(self.client, *date)?;
            columns.push((at.column, *amount));
        }

        let (key, column) = self.match_key(agg);
        let (state, row) = match self.positions.locate_patient(self.client, &key, column)? {
            Lookup::Found(at) => {
                let row = at.row;
                self.client.update_cells(&[
                    CellUpdate::new(row, self.layout.name_column, agg.full_name()),
                    CellUpdate::new(row, self.layout.treatment_plan_column, plan_total.as_str()),
                    CellUpdate::new(row, self.layout.visits_count_column, visits.as_str()),
                ])?;
                tracing::info!(
                    "updated patient {} at row {}: plan {:?}, visits {:?}",
                    agg.code(),
                    row,
                    plan_total,
                    visits
                );
                (RowState::Existing, row)
            }
            Lookup::NotFound => {
                let position = previous_row.unwrap_or(self.layout.header_row) + 1;
                let values = self.new_row(agg, &plan_total, &visits);
                self.client.write_row(&values, Some(position))?;
                self.positions.forget_patients();
                tracing::info!("inserted patient {} at row {}", agg.code(), position);

                match self.positions.locate_patient(self.client, &key, column)? {
                    Lookup::Found(at) => (RowState::New, at.row),
                    Lookup::NotFound => {
                        return Err(SyncError::InsertedRowMissing {
                            code: agg.code().to_owned(),
                            row: position,
                        })
                    }
                }
            }
        };
        agg.row_position = Some(row);

        let cells: Vec<CellUpdate> = columns
            .into_iter()
            .map(|(column, amount)| CellUpdate::new(row, column, amount.to_string()))
            .collect();
        self.client.update_cells(&cells)?;
        if !cells.is_empty() {
            tracing::info!(
                "wrote {} daily sums for patient {} at row {}",
                cells.len(),
                agg.code(),
                row
            );
        }

        Ok(PatientOutcome {
            state,
            period_cells: cells.len(),
            paid_on: sums.into_keys().collect(),
        })
    }

    fn write_payer_counts(
        &mut self,
        payers: &BTreeMap<NaiveDate, BTreeSet<String>>,
    ) -> Result<usize, SyncError> {
        let mut cells = Vec::with_capacity(payers.len());
        for (date, codes) in payers {
            let at = self.positions.coordinate_for_date(self.client, *date)?;
            cells.push(CellUpdate::new(
                self.layout.month_count_row,
                at.column,
                codes.len().to_string(),
            ));
        }
        self.client.update_cells(&cells)?;
        if !cells.is_empty() {
            tracing::info!("wrote payer counts for {} days", cells.len());
        }
        Ok(cells.len())
    }

    fn match_key(&self, agg: &PatientAggregate) -> (String, Option<u32>) {
        match self.layout.patient_match {
            PatientMatch::Code => (agg.code().to_owned(), Some(self.layout.code_column)),
            PatientMatch::FullName => (agg.full_name(), None),
        }
    }

    fn new_row(&self, agg: &PatientAggregate, plan_total: &str, visits: &str) -> Vec<String> {
        let layout = &self.layout;
        let placed = [
            (layout.name_column, agg.full_name()),
            (layout.code_column, agg.code().to_owned()),
            (layout.curator_column, agg.patient.curator.clone()),
            (layout.doctor_column, agg.first_doctor().unwrap_or_default().to_owned()),
            (layout.visits_count_column, visits.to_owned()),
            (layout.treatment_plan_column, plan_total.to_owned()),
        ];
        let width = placed.iter().map(|(col, _)| *col).max().unwrap_or(0) as usize;
        let mut row = vec![String::new(); width];
        for (col, value) in placed {
            if let Some(slot) = (col as usize).checked_sub(1).and_then(|i| row.get_mut(i)) {
                *slot = value;
            }
        }
        row
    }
}

/// Per-day totals of payments and invoices dated on or after `cutoff`.
///
/// Each amount is truncated toward zero before summing, so `"100.5"` and
/// `"50.4"` on one day total `150`.
pub fn period_sums(
    agg: &PatientAggregate,
    cutoff: NaiveDate,
) -> Result<BTreeMap<NaiveDate, i64>, SyncError> {
    let mut sums = BTreeMap::new();
    for (date, raw) in agg.dated_amounts() {
        if date < cutoff {
            continue;
        }
        let amount = truncate_amount(raw).map_err(|e| amount_err(agg.code(), e))?;
        *sums.entry(date).or_insert(0) += amount;
    }
    Ok(sums)
}

fn plan_total_cell(agg: &PatientAggregate) -> Result<String, SyncError> {
    let Some(plan) = agg.plan.as_ref() else {
        return Ok(String::new());
    };
    let total = plan
        .discounted_total()
        .map_err(|e| amount_err(agg.code(), e))?;
    Ok(total.map(|t| t.to_string()).unwrap_or_default())
}

// Zero is left blank in the report.
fn visits_cell(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinisync_core::types::{Invoice, Patient, Payment};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn aggregate() -> PatientAggregate {
        PatientAggregate::new(
            Patient {
                id: "p".into(),
                first_name: "Ivan".into(),
                last_name: "Petrov".into(),
                code: "12".into(),
                curator: String::new(),
                first_visit_date: None,
                last_visit_date: None,
                main_plan_id: None,
            },
            None,
        )
    }

    fn payment(amount: &str, on: NaiveDate) -> Payment {
        Payment {
            id: amount.into(),
            patient_id: "p".into(),
            amount: amount.into(),
            kind: "cash".into(),
            currency: None,
            status: None,
            date_created: on,
        }
    }

    #[test]
    fn truncates_before_summing() {
        let mut agg = aggregate();
        agg.payments.push(payment("100.5", d(2024, 3, 1)));
        agg.payments.push(payment("50.4", d(2024, 3, 1)));
        let sums = period_sums(&agg, d(2023, 1, 1)).unwrap();
        assert_eq!(sums.get(&d(2024, 3, 1)), Some(&150));
    }

    #[test]
    fn records_before_cutoff_are_ignored() {
        let mut agg = aggregate();
        agg.payments.push(payment("10", d(2022, 12, 31)));
        agg.invoices.push(Invoice {
            id: "i".into(),
            patient_id: "p".into(),
            amount: "7".into(),
            date_created: d(2023, 1, 1),
        });
        let sums = period_sums(&agg, d(2023, 1, 1)).unwrap();
        assert_eq!(sums.len(), 1);
        assert_eq!(sums.get(&d(2023, 1, 1)), Some(&7));
    }

    #[test]
    fn malformed_amount_names_patient() {
        let mut agg = aggregate();
        agg.payments.push(payment("12,50", d(2024, 3, 1)));
        let err = period_sums(&agg, d(2023, 1, 1)).unwrap_err();
        assert!(matches!(err, SyncError::MalformedAmount { ref code, .. } if code == "12"));
    }

    #[test]
    fn zero_visits_is_blank() {
        assert_eq!(visits_cell(0), "");
        assert_eq!(visits_cell(3), "3");
    }
}
