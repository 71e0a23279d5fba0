//! Periodic synchronization: one pass at startup, then one per interval,
//! until ctrl-c.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, interval_from, live_pass, run, run_periodically, start_blocking, PassStats,
};
