//! Policy wrapper around a raw [`TableService`].
//!
//! Every remote call first passes the sliding-window [`RateLimiter`], then is
//! retried with a fixed delay while it fails with a transient status. Lookup
//! hits are memoized until a write could have moved them.

use std::collections::HashMap;
use std::sync::Arc;

use clinisync_core::settings::Settings;
use clinisync_core::types::{CellUpdate, TableCoordinate};

use crate::clock::{Clock, SystemClock};
use crate::error::SyncError;
use crate::table::retry::RetryPolicy;
use crate::table::throttle::RateLimiter;
use crate::table::{Lookup, TableError, TableService};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    First { value: String, column: Option<u32> },
    Last { value: String },
}

impl LookupKey {
    fn value(&self) -> &str {
        match self {
            LookupKey::First { value, .. } | LookupKey::Last { value } => value,
        }
    }
}

pub struct ThrottledRetryClient<T> {
    inner: T,
    limiter: RateLimiter,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    lookups: Option<HashMap<LookupKey, TableCoordinate>>,
}

impl<T: TableService> ThrottledRetryClient<T> {
    pub fn new(inner: T, limiter: RateLimiter, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            limiter,
            retry,
            clock,
            lookups: Some(HashMap::new()),
        }
    }

    /// Throttle and retry policy from settings, real wall clock.
    pub fn from_settings(inner: T, settings: &Settings) -> Self {
        Self::new(
            inner,
            RateLimiter::from_settings(&settings.throttle),
            RetryPolicy::from_settings(&settings.retry),
            Arc::new(SystemClock),
        )
    }

    /// Disable lookup memoization; every find reaches the transport.
    pub fn without_lookup_cache(mut self) -> Self {
        self.lookups = None;
        self
    }

    pub fn find(&mut self, value: &str, column: Option<u32>) -> Result<Lookup, SyncError> {
        let key = LookupKey::First {
            value: value.to_owned(),
            column,
        };
        if let Some(hit) = self.cached(&key) {
            return Ok(Lookup::Found(hit));
        }
        let found = self.call("find", |t| t.find(value, column))?;
        Ok(self.remember(key, found))
    }

    pub fn find_last(&mut self, value: &str) -> Result<Lookup, SyncError> {
        let key = LookupKey::Last {
            value: value.to_owned(),
        };
        if let Some(hit) = self.cached(&key) {
            return Ok(Lookup::Found(hit));
        }
        let found = self.call("find_last", |t| t.find_last(value))?;
        Ok(self.remember(key, found))
    }

    /// Insert a row. Rows below shift, so every memoized lookup is dropped.
    pub fn write_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), SyncError> {
        self.clear_cache();
        self.call("write_row", |t| t.insert_row(values, position))
    }

    /// Batched cell overwrite; an empty batch makes no remote call.
    pub fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), SyncError> {
        if cells.is_empty() {
            return Ok(());
        }
        self.invalidate(cells);
        self.call("update_cells", |t| t.update_cells(cells))
    }

    pub fn clear_cache(&mut self) {
        if let Some(lookups) = self.lookups.as_mut() {
            lookups.clear();
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn cached(&self, key: &LookupKey) -> Option<TableCoordinate> {
        let hit = self.lookups.as_ref()?.get(key).copied();
        if let Some(coordinate) = hit {
            tracing::debug!("lookup cache hit for '{}' at {}", key.value(), coordinate);
        }
        hit
    }

    // Misses are not memoized: a later insert may create the value.
    fn remember(&mut self, key: LookupKey, found: Option<TableCoordinate>) -> Lookup {
        if let (Some(lookups), Some(coordinate)) = (self.lookups.as_mut(), found) {
            lookups.insert(key, coordinate);
        }
        Lookup::from(found)
    }

    // A cell write can change the text at a cached coordinate, or introduce a
    // new earlier/later match for a value that is being written.
    fn invalidate(&mut self, cells: &[CellUpdate]) {
        let Some(lookups) = self.lookups.as_mut() else {
            return;
        };
        lookups.retain(|key, coordinate| {
            !cells
                .iter()
                .any(|cell| cell.coordinate() == *coordinate || cell.value == key.value())
        });
    }

    fn call<R>(
        &mut self,
        operation: &'static str,
        mut op: impl FnMut(&mut T) -> Result<R, TableError>,
    ) -> Result<R, SyncError> {
        let attempts = self.retry.attempts;
        let mut attempt = 1;
        loop {
            self.limiter.acquire(self.clock.as_ref());
            match op(&mut self.inner) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    if attempt >= attempts {
                        return Err(SyncError::RetryExhausted {
                            operation,
                            attempts,
                            last: err,
                        });
                    }
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation,
                        attempt,
                        attempts,
                        err,
                        self.retry.delay
                    );
                    self.clock.sleep(self.retry.delay);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(SyncError::Table {
                        operation,
                        source: err,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::table::memory::MemoryTable;
    use std::time::Duration;

    fn client(table: MemoryTable) -> ThrottledRetryClient<MemoryTable> {
        ThrottledRetryClient::new(
            table,
            RateLimiter::new(1000, Duration::from_secs(60)),
            RetryPolicy::never(),
            Arc::new(ManualClock::new()),
        )
    }

    fn grid() -> MemoryTable {
        MemoryTable::from_rows(&[&["", "name", "code"], &["", "Petrov Ivan", "12"]])
    }

    #[test]
    fn repeated_find_hits_cache() {
        let mut c = client(grid());
        assert_eq!(c.find("12", Some(3)).unwrap(), Lookup::Found(TableCoordinate::new(2, 3)));
        assert_eq!(c.find("12", Some(3)).unwrap(), Lookup::Found(TableCoordinate::new(2, 3)));
        assert_eq!(c.inner().calls().find, 1);
    }

    #[test]
    fn misses_are_not_cached() {
        let mut c = client(grid());
        assert_eq!(c.find("99", None).unwrap(), Lookup::NotFound);
        assert_eq!(c.find("99", None).unwrap(), Lookup::NotFound);
        assert_eq!(c.inner().calls().find, 2);
    }

    #[test]
    fn write_row_drops_cached_lookups() {
        let mut c = client(grid());
        c.find("12", Some(3)).unwrap();
        c.write_row(&["".into(), "Sidorov Oleg".into(), "5".into()], Some(2))
            .unwrap();
        assert_eq!(c.find("12", Some(3)).unwrap(), Lookup::Found(TableCoordinate::new(3, 3)));
        assert_eq!(c.inner().calls().find, 2);
    }

    #[test]
    fn update_invalidates_only_affected_entries() {
        let mut c = client(grid());
        c.find("12", Some(3)).unwrap();
        c.find("name", None).unwrap();

        c.update_cells(&[CellUpdate::new(1, 2, "label")]).unwrap();
        c.find("12", Some(3)).unwrap();
        assert_eq!(c.inner().calls().find, 2);

        assert_eq!(c.find("name", None).unwrap(), Lookup::NotFound);
        assert_eq!(c.inner().calls().find, 3);
    }

    #[test]
    fn empty_update_makes_no_call() {
        let mut c = client(grid());
        c.update_cells(&[]).unwrap();
        assert_eq!(c.inner().calls().update_cells, 0);
    }

    #[test]
    fn without_cache_always_calls_transport() {
        let mut c = client(grid()).without_lookup_cache();
        c.find_last("12").unwrap();
        c.find_last("12").unwrap();
        assert_eq!(c.inner().calls().find_last, 2);
    }
}
