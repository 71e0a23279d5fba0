//! Merge independently fetched record streams into per-patient aggregates.

use std::collections::HashMap;

use serde::Serialize;

use clinisync_core::types::{PatientAggregate, PatientId, Plan, PlanId};

use crate::error::SyncError;
use crate::source::RecordSet;

/// Child records whose patient was not in the patient list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DroppedRecords {
    pub visits: usize,
    pub payments: usize,
    pub invoices: usize,
}

impl DroppedRecords {
    pub fn total(&self) -> usize {
        self.visits + self.payments + self.invoices
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Strictly ascending by numeric code.
    pub aggregates: Vec<PatientAggregate>,
    pub dropped: DroppedRecords,
}

/// Join records into aggregates ordered by numeric patient code.
///
/// Orphaned visits, payments and invoices are dropped with a warning. A
/// non-numeric or repeated patient code aborts the join.
pub fn join(records: RecordSet) -> Result<JoinOutcome, SyncError> {
    let RecordSet {
        patients,
        visits,
        payments,
        plans,
        invoices,
    } = records;

    let plans: HashMap<PlanId, Plan> = plans.into_iter().map(|p| (p.id.clone(), p)).collect();

    let mut by_id: HashMap<PatientId, PatientAggregate> = HashMap::with_capacity(patients.len());
    for patient in patients {
        let plan = patient
            .main_plan_id
            .as_ref()
            .and_then(|id| plans.get(id))
            .cloned();
        let id = patient.id.clone();
        if by_id.insert(id.clone(), PatientAggregate::new(patient, plan)).is_some() {
            tracing::warn!("patient {} listed twice, keeping the later record", id);
        }
    }

    let mut dropped = DroppedRecords::default();

    for visit in visits {
        match by_id.get_mut(&visit.patient_id) {
            Some(agg) => agg.visits.push(visit),
            None => {
                tracing::warn!(
                    "dropping visit {} for unknown patient {}",
                    visit.id,
                    visit.patient_id
                );
                dropped.visits += 1;
            }
        }
    }
    for payment in payments {
        match by_id.get_mut(&payment.patient_id) {
            Some(agg) => agg.payments.push(payment),
            None => {
                tracing::warn!(
                    "dropping payment {} for unknown patient {}",
                    payment.id,
                    payment.patient_id
                );
                dropped.payments += 1;
            }
        }
    }
    for invoice in invoices {
        match by_id.get_mut(&invoice.patient_id) {
            Some(agg) => agg.invoices.push(invoice),
            None => {
                tracing::warn!(
                    "dropping invoice {} for unknown patient {}",
                    invoice.id,
                    invoice.patient_id
                );
                dropped.invoices += 1;
            }
        }
    }

    let mut keyed = Vec::with_capacity(by_id.len());
    for agg in by_id.into_values() {
        let key = numeric_code(&agg)?;
        keyed.push((key, agg));
    }
    keyed.sort_by_key(|(key, _)| *key);

    for pair in keyed.windows(2) {
        let ((a, first), (b, second)) = (&pair[0], &pair[1]);
        if a == b {
            return Err(SyncError::DuplicateCode {
                code: second.code().to_owned(),
                first: first.patient.id.to_string(),
                second: second.patient.id.to_string(),
            });
        }
    }

    if dropped.total() > 0 {
        tracing::warn!(
            "dropped {} orphaned records ({} visits, {} payments, {} invoices)",
            dropped.total(),
            dropped.visits,
            dropped.payments,
            dropped.invoices
        );
    }

    Ok(JoinOutcome {
        aggregates: keyed.into_iter().map(|(_, agg)| agg).collect(),
        dropped,
    })
}

fn numeric_code(agg: &PatientAggregate) -> Result<i64, SyncError> {
    agg.code()
        .trim()
        .parse()
        .map_err(|_| SyncError::MalformedCode {
            patient_id: agg.patient.id.to_string(),
            code: agg.code().to_owned(),
        })
}
