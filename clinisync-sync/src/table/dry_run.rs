//! Table wrapper that records writes instead of sending them.
//!
//! Reads reach the wrapped service. Inserted rows are overlaid so later finds
//! see them, and rows found remotely are shifted by the inserts above them.
//! Cell updates are recorded only; positions are therefore approximate.

use serde::Serialize;

use clinisync_core::types::{CellUpdate, TableCoordinate};

use crate::table::{TableError, TableService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedWrite {
    InsertRow { position: u32, values: Vec<String> },
    UpdateCells { cells: Vec<CellUpdate> },
}

#[derive(Debug)]
pub struct DryRunTable<T> {
    inner: T,
    writes: Vec<RecordedWrite>,
    // Inserted rows in current coordinates, kept sorted by row.
    overlay: Vec<(u32, Vec<String>)>,
}

impl<T: TableService> DryRunTable<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            writes: Vec::new(),
            overlay: Vec::new(),
        }
    }

    pub fn writes(&self) -> &[RecordedWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<RecordedWrite> {
        self.writes
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn overlay_matches(&self, value: &str, column: Option<u32>) -> Vec<TableCoordinate> {
        let mut found = Vec::new();
        for (row, values) in &self.overlay {
            for (i, cell) in values.iter().enumerate() {
                let coordinate = TableCoordinate::new(*row, i as u32 + 1);
                if cell == value && column.map_or(true, |c| c == coordinate.column) {
                    found.push(coordinate);
                }
            }
        }
        found
    }

    // Map a row of the untouched remote table into overlaid coordinates.
    fn shift(&self, mut coordinate: TableCoordinate) -> TableCoordinate {
        for (row, _) in &self.overlay {
            if *row <= coordinate.row {
                coordinate.row += 1;
            }
        }
        coordinate
    }
}

impl<T: TableService> TableService for DryRunTable<T> {
    fn find(
        &mut self,
        value: &str,
        column: Option<u32>,
    ) -> Result<Option<TableCoordinate>, TableError> {
        let remote = self.inner.find(value, column)?.map(|c| self.shift(c));
        let local = self.overlay_matches(value, column).into_iter().min();
        Ok(remote.into_iter().chain(local).min())
    }

    fn find_last(&mut self, value: &str) -> Result<Option<TableCoordinate>, TableError> {
        let remote = self.inner.find_last(value)?.map(|c| self.shift(c));
        let local = self.overlay_matches(value, None).into_iter().max();
        Ok(remote.into_iter().chain(local).max())
    }

    fn insert_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), TableError> {
        let position = position.unwrap_or(1);
        for (row, _) in self.overlay.iter_mut() {
            if *row >= position {
                *row += 1;
            }
        }
        let at = self.overlay.partition_point(|(row, _)| *row < position);
        self.overlay.insert(at, (position, values.to_vec()));
        tracing::info!("dry run: insert row at {}", position);
        self.writes.push(RecordedWrite::InsertRow {
            position,
            values: values.to_vec(),
        });
        Ok(())
    }

    fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), TableError> {
        tracing::info!("dry run: update {} cells", cells.len());
        self.writes.push(RecordedWrite::UpdateCells {
            cells: cells.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::memory::MemoryTable;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn writes_never_reach_inner() {
        let mut t = DryRunTable::new(MemoryTable::from_rows(&[&["a"]]));
        t.insert_row(&row(&["b"]), Some(2)).unwrap();
        t.update_cells(&[CellUpdate::new(1, 1, "z")]).unwrap();
        assert_eq!(t.inner().calls().insert_row, 0);
        assert_eq!(t.inner().calls().update_cells, 0);
        assert_eq!(t.inner().cell(1, 1), "a");
        assert_eq!(t.writes().len(), 2);
    }

    #[test]
    fn inserted_rows_are_visible_to_find() {
        let mut t = DryRunTable::new(MemoryTable::new());
        t.insert_row(&row(&["", "Petrov Ivan", "12"]), Some(8)).unwrap();
        assert_eq!(
            t.find("12", Some(3)).unwrap(),
            Some(TableCoordinate::new(8, 3))
        );
    }

    #[test]
    fn remote_rows_shift_below_inserts() {
        let mut t = DryRunTable::new(MemoryTable::from_rows(&[&["h"], &["12"]]));
        t.insert_row(&row(&["5"]), Some(2)).unwrap();
        assert_eq!(t.find("12", None).unwrap(), Some(TableCoordinate::new(3, 1)));
        assert_eq!(t.find("5", None).unwrap(), Some(TableCoordinate::new(2, 1)));
        assert_eq!(t.find_last("h").unwrap(), Some(TableCoordinate::new(1, 1)));
    }

    #[test]
    fn earlier_insert_pushes_overlay_rows() {
        let mut t = DryRunTable::new(MemoryTable::new());
        t.insert_row(&row(&["first"]), Some(8)).unwrap();
        t.insert_row(&row(&["second"]), Some(8)).unwrap();
        assert_eq!(t.find("first", None).unwrap(), Some(TableCoordinate::new(9, 1)));
        assert_eq!(t.find("second", None).unwrap(), Some(TableCoordinate::new(8, 1)));
    }
}
