use std::sync::Arc;
use std::time::Duration;

use clinisync_core::types::TableCoordinate;
use clinisync_sync::{
    Lookup, ManualClock, MemoryTable, RateLimiter, RetryPolicy, SyncError, TableError,
    ThrottledRetryClient,
};

fn status(code: u16) -> TableError {
    TableError::Status {
        status: code,
        message: "scripted".into(),
    }
}

fn table() -> MemoryTable {
    let mut t = MemoryTable::new();
    t.set(8, 4, "12");
    t
}

fn client(
    table: MemoryTable,
    limiter: RateLimiter,
    clock: &Arc<ManualClock>,
) -> ThrottledRetryClient<MemoryTable> {
    ThrottledRetryClient::new(
        table,
        limiter,
        RetryPolicy::new(5, Duration::from_secs(10)),
        clock.clone(),
    )
}

fn roomy() -> RateLimiter {
    RateLimiter::new(1000, Duration::from_secs(60))
}

#[test]
fn transient_failures_then_success() {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new());
    let mut t = table();
    t.fail_with([status(503), status(500)]);
    let mut c = client(t, roomy(), &clock);

    let found = c.find("12", Some(4)).expect("find succeeds after retries");

    assert_eq!(found, Lookup::Found(TableCoordinate::new(8, 4)));
    assert_eq!(c.inner().calls().find, 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[test]
fn conflict_is_retried() {
    let clock = Arc::new(ManualClock::new());
    let mut t = table();
    t.fail_with([status(409)]);
    let mut c = client(t, roomy(), &clock);

    c.update_cells(&[clinisync_core::types::CellUpdate::new(1, 1, "x")])
        .expect("update succeeds after one retry");
    assert_eq!(c.inner().calls().update_cells, 2);
    assert_eq!(clock.sleeps().len(), 1);
}

#[test]
fn persistent_transient_failure_exhausts_retries() {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new());
    let mut t = table();
    t.fail_with(std::iter::repeat_with(|| status(503)).take(10));
    let mut c = client(t, roomy(), &clock);

    let err = c.find("12", None).expect_err("must give up");

    match err {
        SyncError::RetryExhausted {
            operation,
            attempts,
            last,
        } => {
            assert_eq!(operation, "find");
            assert_eq!(attempts, 5);
            assert_eq!(last, status(503));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(c.inner().calls().find, 5);
    assert_eq!(clock.sleeps().len(), 4);
}

#[test]
fn non_transient_failure_is_not_retried() {
    let clock = Arc::new(ManualClock::new());
    let mut t = table();
    t.fail_with([status(403)]);
    let mut c = client(t, roomy(), &clock);

    let err = c
        .write_row(&["a".to_string()], Some(9))
        .expect_err("forbidden propagates");

    assert!(matches!(
        err,
        SyncError::Table {
            operation: "write_row",
            ..
        }
    ));
    assert_eq!(c.inner().calls().insert_row, 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn call_over_limit_blocks_until_window_frees() {
    let clock = Arc::new(ManualClock::new());
    let mut c = client(
        table(),
        RateLimiter::new(3, Duration::from_secs(60)),
        &clock,
    )
    .without_lookup_cache();

    for _ in 0..3 {
        c.find("12", None).expect("within limit");
        clock.advance(Duration::from_secs(1));
    }
    assert!(clock.sleeps().is_empty());

    c.find("12", None).expect("admitted after waiting");

    // First call at t=0 leaves the window at t=60; the fourth arrives at t=3.
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(57)]);
    assert!(clock.elapsed() >= Duration::from_secs(60));
    assert_eq!(c.inner().calls().find, 4);
}

#[test]
fn retries_count_against_rate_limit() {
    let clock = Arc::new(ManualClock::new());
    let mut t = table();
    t.fail_with([status(503)]);
    let mut c = ThrottledRetryClient::new(
        t,
        RateLimiter::new(1, Duration::from_secs(30)),
        RetryPolicy::new(2, Duration::from_secs(10)),
        clock.clone(),
    );

    c.find("12", None).expect("second attempt succeeds");

    // 10s retry delay, then 20s more until the first stamp leaves the window.
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(10), Duration::from_secs(20)]
    );
}
