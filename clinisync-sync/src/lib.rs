//! # clinisync-sync
//!
//! Reconciles clinic patient records with the spreadsheet report.
//!
//! [`join`] turns the fetched record streams into ordered aggregates and
//! [`SyncEngine::synchronize`] writes them through a [`ThrottledRetryClient`].
//! [`run`] does both for one scheduled pass.

pub mod clock;
pub mod engine;
pub mod error;
pub mod joiner;
pub mod period;
pub mod pipeline;
pub mod position_cache;
pub mod source;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{period_sums, SyncEngine, SyncReport};
pub use error::SyncError;
pub use joiner::{join, DroppedRecords, JoinOutcome};
pub use period::{day_offset_of, half_year_label, half_year_of, resolve_day_offset};
pub use pipeline::{collect, run, summarize, PatientSummary};
pub use position_cache::PositionCache;
pub use source::{fetch_all, RecordSet, RecordSource, StaticSource};
pub use table::client::ThrottledRetryClient;
pub use table::dry_run::{DryRunTable, RecordedWrite};
pub use table::memory::{CallCounts, MemoryTable};
pub use table::retry::RetryPolicy;
pub use table::throttle::RateLimiter;
pub use table::{Lookup, TableError, TableService};
