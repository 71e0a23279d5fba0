//! In-process grid implementing [`TableService`].
//!
//! Used for tests and offline runs. Counts every call and can replay a queue of
//! scripted failures, one per call, before behaving normally again.

use std::collections::VecDeque;

use clinisync_core::types::{CellUpdate, TableCoordinate};

use crate::table::{TableError, TableService};

/// Per-primitive call counters. Failed calls are counted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub find: usize,
    pub find_last: usize,
    pub insert_row: usize,
    pub update_cells: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.find + self.find_last + self.insert_row + self.update_cells
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Vec<Vec<String>>,
    calls: CallCounts,
    failures: VecDeque<TableError>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| (*cell).to_owned()).collect())
                .collect(),
            ..Self::default()
        }
    }

    /// Queue errors returned by the next calls, in order.
    pub fn fail_with(&mut self, errors: impl IntoIterator<Item = TableError>) {
        self.failures.extend(errors);
    }

    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    /// Cell text at a 1-based coordinate; empty when outside the grid.
    pub fn cell(&self, row: u32, column: u32) -> &str {
        let (Some(r), Some(c)) = (index(row), index(column)) else {
            return "";
        };
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .map_or("", String::as_str)
    }

    pub fn set(&mut self, row: u32, column: u32, value: impl Into<String>) {
        let (Some(r), Some(c)) = (index(row), index(column)) else {
            return;
        };
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, String::new());
        }
        cells[c] = value.into();
    }

    fn scripted_failure(&mut self) -> Result<(), TableError> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn matches(&self, value: &str, column: Option<u32>) -> impl Iterator<Item = TableCoordinate> + '_ {
        let value = value.to_owned();
        self.rows.iter().enumerate().flat_map(move |(r, cells)| {
            let value = value.clone();
            cells
                .iter()
                .enumerate()
                .filter(move |(_, cell)| **cell == value)
                .map(move |(c, _)| TableCoordinate::new(r as u32 + 1, c as u32 + 1))
                .filter(move |coordinate| column.map_or(true, |col| coordinate.column == col))
        })
    }
}

fn index(one_based: u32) -> Option<usize> {
    usize::try_from(one_based).ok()?.checked_sub(1)
}

impl TableService for MemoryTable {
    fn find(
        &mut self,
        value: &str,
        column: Option<u32>,
    ) -> Result<Option<TableCoordinate>, TableError> {
        self.calls.find += 1;
        self.scripted_failure()?;
        Ok(self.matches(value, column).next())
    }

    fn find_last(&mut self, value: &str) -> Result<Option<TableCoordinate>, TableError> {
        self.calls.find_last += 1;
        self.scripted_failure()?;
        Ok(self.matches(value, None).last())
    }

    /// Position defaults to row 1. Positions past the end pad with empty rows.
    fn insert_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), TableError> {
        self.calls.insert_row += 1;
        self.scripted_failure()?;
        let at = index(position.unwrap_or(1))
            .ok_or_else(|| TableError::Status {
                status: 400,
                message: "row positions start at 1".into(),
            })?;
        if self.rows.len() < at {
            self.rows.resize_with(at, Vec::new);
        }
        self.rows.insert(at, values.to_vec());
        Ok(())
    }

    fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), TableError> {
        self.calls.update_cells += 1;
        self.scripted_failure()?;
        for cell in cells {
            self.set(cell.row, cell.column, cell.value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_row_major() {
        let mut t = MemoryTable::from_rows(&[&["", "x"], &["x", "x"]]);
        assert_eq!(t.find("x", None).unwrap(), Some(TableCoordinate::new(1, 2)));
        assert_eq!(t.find("x", Some(1)).unwrap(), Some(TableCoordinate::new(2, 1)));
        assert_eq!(t.find_last("x").unwrap(), Some(TableCoordinate::new(2, 2)));
        assert_eq!(t.find("y", None).unwrap(), None);
    }

    #[test]
    fn insert_shifts_rows_down() {
        let mut t = MemoryTable::from_rows(&[&["a"], &["b"]]);
        t.insert_row(&["new".to_string()], Some(2)).unwrap();
        assert_eq!(t.cell(1, 1), "a");
        assert_eq!(t.cell(2, 1), "new");
        assert_eq!(t.cell(3, 1), "b");
    }

    #[test]
    fn insert_past_end_pads() {
        let mut t = MemoryTable::new();
        t.insert_row(&["x".to_string()], Some(4)).unwrap();
        assert_eq!(t.rows.len(), 4);
        assert_eq!(t.cell(4, 1), "x");
    }

    #[test]
    fn update_grows_grid() {
        let mut t = MemoryTable::new();
        t.update_cells(&[CellUpdate::new(3, 5, "150")]).unwrap();
        assert_eq!(t.cell(3, 5), "150");
        assert_eq!(t.cell(9, 9), "");
    }

    #[test]
    fn scripted_failures_are_consumed_in_order() {
        let mut t = MemoryTable::new();
        t.fail_with([TableError::Transport("reset".into())]);
        assert!(t.find("x", None).is_err());
        assert!(t.find("x", None).is_ok());
        assert_eq!(t.calls().find, 2);
    }
}
