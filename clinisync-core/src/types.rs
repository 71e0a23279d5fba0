//! Domain types for clinic records and the report table.
//!
//! Record types mirror what the clinic-management API returns; identifiers are
//! kept as strings and joined by exact equality. Dates of monetary records are
//! day-granular (`NaiveDate`) so records created on the same calendar day merge.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseAmountError;

/// Visit status that counts toward the visited-count metric.
pub const VISITED_STATUS: &str = "VISITED";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed patient identifier as issued by the clinic API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(pub String);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PatientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PatientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed treatment plan identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(pub String);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PlanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Half-year marker string (e.g. `"1 полугодие 2024"`) anchoring a block of
/// day columns in the report table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodLabel(pub String);

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse a decimal amount string and truncate it toward zero.
///
/// `"150.00"` → `150`, `"100.5"` → `100`, `"-20.9"` → `-20`.
pub fn truncate_amount(raw: &str) -> Result<i64, ParseAmountError> {
    let value: f64 = raw.trim().parse().map_err(|_| ParseAmountError {
        raw: raw.to_owned(),
    })?;
    if !value.is_finite() {
        return Err(ParseAmountError {
            raw: raw.to_owned(),
        });
    }
    Ok(value.trunc() as i64)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A patient as listed by the clinic API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    /// Numeric string; sort key and row-match key in the report.
    pub code: String,
    pub curator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_visit_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_visit_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_plan_id: Option<PlanId>,
}

impl Patient {
    /// Report display name: `"{last_name} {first_name}"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

/// A treatment plan (financial target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub doctor_id: String,
    pub plan_total: String,
    pub plan_total_with_discount: String,
}

impl Plan {
    /// Discounted total truncated to an integer; `None` when the API sent an
    /// empty value.
    pub fn discounted_total(&self) -> Result<Option<i64>, ParseAmountError> {
        if self.plan_total_with_discount.trim().is_empty() {
            return Ok(None);
        }
        truncate_amount(&self.plan_total_with_discount).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    pub patient_id: PatientId,
    pub status: String,
    pub doctor: String,
    /// ISO-like timestamp as sent by the API; compared lexically.
    pub date_created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_end: Option<String>,
}

impl Visit {
    pub fn is_visited(&self) -> bool {
        self.status == VISITED_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub patient_id: PatientId,
    pub amount: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub date_created: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub patient_id: PatientId,
    pub amount: String,
    pub date_created: NaiveDate,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// A patient merged with its plan, visits, payments and invoices.
///
/// Built once per run by the joiner; only `row_position` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientAggregate {
    pub patient: Patient,
    pub plan: Option<Plan>,
    pub visits: Vec<Visit>,
    pub payments: Vec<Payment>,
    pub invoices: Vec<Invoice>,
    /// 1-based report row, assigned once the patient is located or inserted.
    pub row_position: Option<u32>,
}

impl PatientAggregate {
    pub fn new(patient: Patient, plan: Option<Plan>) -> Self {
        Self {
            patient,
            plan,
            visits: Vec::new(),
            payments: Vec::new(),
            invoices: Vec::new(),
            row_position: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.patient.code
    }

    pub fn full_name(&self) -> String {
        self.patient.full_name()
    }

    /// Number of visits with status [`VISITED_STATUS`].
    pub fn visited_count(&self) -> usize {
        self.visits.iter().filter(|v| v.is_visited()).count()
    }

    /// Doctor of the earliest visit (first one wins on equal timestamps).
    pub fn first_doctor(&self) -> Option<&str> {
        self.visits
            .iter()
            .min_by(|a, b| a.date_created.cmp(&b.date_created))
            .map(|v| v.doctor.as_str())
    }

    /// Payments followed by invoices, as `(day, raw amount)` pairs.
    pub fn dated_amounts(&self) -> impl Iterator<Item = (NaiveDate, &str)> + '_ {
        self.payments
            .iter()
            .map(|p| (p.date_created, p.amount.as_str()))
            .chain(
                self.invoices
                    .iter()
                    .map(|i| (i.date_created, i.amount.as_str())),
            )
    }
}

// ---------------------------------------------------------------------------
// Table addressing
// ---------------------------------------------------------------------------

/// A 1-based `(row, column)` address in the report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableCoordinate {
    pub row: u32,
    pub column: u32,
}

impl TableCoordinate {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for TableCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}C{}", self.row, self.column)
    }
}

/// One cell write inside a batched update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub row: u32,
    pub column: u32,
    pub value: String,
}

impl CellUpdate {
    pub fn new(row: u32, column: u32, value: impl Into<String>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
        }
    }

    pub fn coordinate(&self) -> TableCoordinate {
        TableCoordinate::new(self.row, self.column)
    }
}

/// Inclusive date window used to filter record fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
