//! Run-scoped memo of resolved table coordinates.
//!
//! Period labels and the day columns derived from them never move while a run
//! is in progress: inserts only add rows. Patient rows do move, so those entries
//! are dropped whenever a row is inserted.

use std::collections::HashMap;

use chrono::NaiveDate;

use clinisync_core::settings::Layout;
use clinisync_core::types::{PeriodLabel, TableCoordinate};

use crate::error::SyncError;
use crate::period::{day_offset_of, half_year_label};
use crate::table::client::ThrottledRetryClient;
use crate::table::{Lookup, TableService};

#[derive(Debug, Clone)]
pub struct PositionCache {
    date_header_row: u32,
    label_template: String,
    dates: HashMap<NaiveDate, TableCoordinate>,
    labels: HashMap<PeriodLabel, TableCoordinate>,
    patients: HashMap<(String, Option<u32>), TableCoordinate>,
}

impl PositionCache {
    pub fn new(layout: &Layout) -> Self {
        Self {
            date_header_row: layout.date_header_row,
            label_template: layout.period_label_template.clone(),
            dates: HashMap::new(),
            labels: HashMap::new(),
            patients: HashMap::new(),
        }
    }

    /// Header cell of the day column for `date`.
    ///
    /// The column is the half-year anchor's column plus the day offset minus
    /// one; the row is always the date header row.
    pub fn coordinate_for_date<T: TableService>(
        &mut self,
        client: &mut ThrottledRetryClient<T>,
        date: NaiveDate,
    ) -> Result<TableCoordinate, SyncError> {
        if let Some(hit) = self.dates.get(&date) {
            return Ok(*hit);
        }

        let offset = day_offset_of(date)?;
        let label = half_year_label(date, &self.label_template);
        let anchor = self.anchor(client, label)?;
        let coordinate = TableCoordinate::new(self.date_header_row, anchor.column + offset - 1);

        tracing::debug!("date {} resolved to {}", date, coordinate);
        self.dates.insert(date, coordinate);
        Ok(coordinate)
    }

    /// Locate a patient row by `key`, optionally restricted to `column`.
    pub fn locate_patient<T: TableService>(
        &mut self,
        client: &mut ThrottledRetryClient<T>,
        key: &str,
        column: Option<u32>,
    ) -> Result<Lookup, SyncError> {
        let cache_key = (key.to_owned(), column);
        if let Some(hit) = self.patients.get(&cache_key) {
            return Ok(Lookup::Found(*hit));
        }
        let found = client.find(key, column)?;
        if let Lookup::Found(coordinate) = found {
            self.patients.insert(cache_key, coordinate);
        }
        Ok(found)
    }

    /// Drop patient rows after an insert shifted them.
    pub fn forget_patients(&mut self) {
        self.patients.clear();
    }

    pub fn cached_dates(&self) -> usize {
        self.dates.len()
    }

    fn anchor<T: TableService>(
        &mut self,
        client: &mut ThrottledRetryClient<T>,
        label: PeriodLabel,
    ) -> Result<TableCoordinate, SyncError> {
        if let Some(hit) = self.labels.get(&label) {
            return Ok(*hit);
        }
        match client.find(&label.0, None)? {
            Lookup::Found(anchor) => {
                self.labels.insert(label, anchor);
                Ok(anchor)
            }
            Lookup::NotFound => Err(SyncError::PeriodLabelMissing { label }),
        }
    }
}
