//! Remote report table: transport seam, policy wrapper and helpers.
//!
//! - [`TableService`]: raw transport primitives (one remote call each)
//! - [`client::ThrottledRetryClient`]: rate limit, retry and lookup caching
//!   around any transport
//! - [`memory::MemoryTable`]: in-process grid
//! - [`dry_run::DryRunTable`]: records writes instead of sending them

pub mod client;
pub mod dry_run;
pub mod memory;
pub mod retry;
pub mod throttle;

use thiserror::Error;

use clinisync_core::types::{CellUpdate, TableCoordinate};

/// Failure reported by a table transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The service answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl TableError {
    /// Server-side (5xx) and conflict (409) statuses are expected to clear on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            TableError::Status { status, .. } => *status == 409 || (500..600).contains(status),
            TableError::Transport(_) | TableError::Decode(_) => false,
        }
    }
}

/// Outcome of a value search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(TableCoordinate),
    NotFound,
}

impl Lookup {
    pub fn coordinate(self) -> Option<TableCoordinate> {
        match self {
            Lookup::Found(coordinate) => Some(coordinate),
            Lookup::NotFound => None,
        }
    }
}

impl From<Option<TableCoordinate>> for Lookup {
    fn from(found: Option<TableCoordinate>) -> Self {
        found.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// Raw remote table primitives. Cells are searched row-major.
pub trait TableService {
    /// First cell whose text equals `value`, optionally restricted to `column`.
    fn find(&mut self, value: &str, column: Option<u32>)
        -> Result<Option<TableCoordinate>, TableError>;

    /// Last cell whose text equals `value`.
    fn find_last(&mut self, value: &str) -> Result<Option<TableCoordinate>, TableError>;

    /// Insert a row at `position` (1-based; the service default when `None`),
    /// shifting later rows down.
    fn insert_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), TableError>;

    /// Overwrite several cells in one request.
    fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), TableError>;
}

impl<T: TableService + ?Sized> TableService for &mut T {
    fn find(
        &mut self,
        value: &str,
        column: Option<u32>,
    ) -> Result<Option<TableCoordinate>, TableError> {
        (**self).find(value, column)
    }

    fn find_last(&mut self, value: &str) -> Result<Option<TableCoordinate>, TableError> {
        (**self).find_last(value)
    }

    fn insert_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), TableError> {
        (**self).insert_row(values, position)
    }

    fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), TableError> {
        (**self).update_cells(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TableError {
        TableError::Status {
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn transient_classification() {
        for code in [500, 502, 503, 599, 409] {
            assert!(status(code).is_transient(), "{code} should be transient");
        }
        for code in [400, 401, 403, 404, 429] {
            assert!(!status(code).is_transient(), "{code} should not be transient");
        }
        assert!(!TableError::Transport("reset".into()).is_transient());
    }

    #[test]
    fn lookup_from_option() {
        let c = TableCoordinate::new(2, 3);
        assert_eq!(Lookup::from(Some(c)), Lookup::Found(c));
        assert_eq!(Lookup::from(None), Lookup::NotFound);
        assert_eq!(Lookup::Found(c).coordinate(), Some(c));
    }
}
