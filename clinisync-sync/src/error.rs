//! Error types for clinisync-sync.

use thiserror::Error;

use clinisync_core::error::ParseAmountError;
use clinisync_core::types::PeriodLabel;

use crate::table::TableError;

/// All errors that can abort a synchronization run.
///
/// A lookup miss is not an error; see [`crate::table::Lookup`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Patient code is not an integer; sort order cannot be established.
    #[error("patient {patient_id} has non-numeric code '{code}'")]
    MalformedCode { patient_id: String, code: String },

    /// Two patients share a code, so row matching would be ambiguous.
    #[error("patient code '{code}' is used by both {first} and {second}")]
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },

    /// A payment, invoice or plan total could not be read as a number.
    #[error("patient '{code}': {source}")]
    MalformedAmount {
        code: String,
        #[source]
        source: ParseAmountError,
    },

    /// Day outside the separator-inclusive month length, or month outside the half.
    #[error("invalid date {year}-{month:02}-{day:02} for half-year {half}")]
    InvalidDate {
        year: i32,
        half: u8,
        month: u32,
        day: u32,
    },

    /// No anchor cell carries the half-year label; no coordinate can be computed.
    #[error("period label '{label}' not found in the report")]
    PeriodLabelMissing { label: PeriodLabel },

    /// A freshly inserted row could not be found again.
    #[error("patient '{code}' not found after inserting at row {row}")]
    InsertedRowMissing { code: String, row: u32 },

    /// Non-transient remote failure; never retried.
    #[error("{operation} failed: {source}")]
    Table {
        operation: &'static str,
        #[source]
        source: TableError,
    },

    /// Transient remote failure persisted through every attempt.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: TableError,
    },

    /// The record source (clinic API) failed.
    #[error("record source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Fatal error while processing one patient.
    #[error(
        "sync aborted at patient '{code}' (last committed: {}): {source}",
        .last_committed.as_deref().unwrap_or("none")
    )]
    PatientFailed {
        code: String,
        last_committed: Option<String>,
        #[source]
        source: Box<SyncError>,
    },
}

/// Convenience constructor for [`SyncError::MalformedAmount`].
pub(crate) fn amount_err(code: &str, source: ParseAmountError) -> SyncError {
    SyncError::MalformedAmount {
        code: code.to_owned(),
        source,
    }
}
