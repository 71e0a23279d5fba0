//! Record source seam: the five independent entity streams.

use std::convert::Infallible;

use clinisync_core::types::{DateRange, Invoice, Patient, Payment, Plan, Visit};

use crate::error::SyncError;

/// Read access to the clinic-management records.
///
/// Each stream is fetched independently; identifiers are joined later by exact
/// equality, so a source does not need to be internally consistent.
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn patients(&self) -> Result<Vec<Patient>, Self::Error>;
    fn visits(&self, range: DateRange) -> Result<Vec<Visit>, Self::Error>;
    fn payments(&self, range: DateRange) -> Result<Vec<Payment>, Self::Error>;
    fn plans(&self, range: DateRange) -> Result<Vec<Plan>, Self::Error>;
    fn invoices(&self, range: DateRange) -> Result<Vec<Invoice>, Self::Error>;
}

/// Everything fetched for one run, before joining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub patients: Vec<Patient>,
    pub visits: Vec<Visit>,
    pub payments: Vec<Payment>,
    pub plans: Vec<Plan>,
    pub invoices: Vec<Invoice>,
}

/// Fetch all five streams for `range`.
pub fn fetch_all<S: RecordSource>(source: &S, range: DateRange) -> Result<RecordSet, SyncError> {
    let wrap = |e: S::Error| SyncError::Source(Box::new(e));
    let records = RecordSet {
        patients: source.patients().map_err(wrap)?,
        visits: source.visits(range).map_err(wrap)?,
        payments: source.payments(range).map_err(wrap)?,
        plans: source.plans(range).map_err(wrap)?,
        invoices: source.invoices(range).map_err(wrap)?,
    };
    tracing::info!(
        "fetched {} patients, {} visits, {} payments, {} plans, {} invoices",
        records.patients.len(),
        records.visits.len(),
        records.payments.len(),
        records.plans.len(),
        records.invoices.len()
    );
    Ok(records)
}

/// Fixed in-memory records. Payments and invoices honour the date range.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub records: RecordSet,
}

impl StaticSource {
    pub fn new(records: RecordSet) -> Self {
        Self { records }
    }
}

impl RecordSource for StaticSource {
    type Error = Infallible;

    fn patients(&self) -> Result<Vec<Patient>, Infallible> {
        Ok(self.records.patients.clone())
    }

    fn visits(&self, _range: DateRange) -> Result<Vec<Visit>, Infallible> {
        Ok(self.records.visits.clone())
    }

    fn payments(&self, range: DateRange) -> Result<Vec<Payment>, Infallible> {
        Ok(self
            .records
            .payments
            .iter()
            .filter(|p| (range.from..=range.to).contains(&p.date_created))
            .cloned()
            .collect())
    }

    fn plans(&self, _range: DateRange) -> Result<Vec<Plan>, Infallible> {
        Ok(self.records.plans.clone())
    }

    fn invoices(&self, range: DateRange) -> Result<Vec<Invoice>, Infallible> {
        Ok(self
            .records
            .invoices
            .iter()
            .filter(|i| (range.from..=range.to).contains(&i.date_created))
            .cloned()
            .collect())
    }
}
