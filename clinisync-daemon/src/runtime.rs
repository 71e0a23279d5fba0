use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use clinisync_core::settings::Settings;
use clinisync_remote::{ClinicCardsSource, SheetsTable};
use clinisync_sync::{pipeline, SyncError, SyncReport, ThrottledRetryClient};

use crate::error::{task_err, DaemonError};

/// Outcome counts of the passes run before shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Start the scheduler and block the current thread until ctrl-c.
pub fn start_blocking(settings: Settings, interval: Duration) -> Result<PassStats, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;
    runtime.block_on(run(settings, interval))
}

/// Run live passes against the configured services every `interval`.
pub async fn run(settings: Settings, interval: Duration) -> Result<PassStats, DaemonError> {
    settings.validate()?;
    tracing::info!(
        "scheduler started, syncing every {} minutes",
        interval.as_secs() / 60
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let settings = Arc::new(settings);
        tokio::spawn(async move {
            let result =
                run_periodically(interval, shutdown_rx, move || live_pass(&settings)).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, stopping scheduler");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => {
                        let _ = shutdown.send(());
                        Err(task_err("signal", err))
                    }
                },
            }
        })
    };

    let (scheduler_result, signal_result) = tokio::join!(scheduler_handle, signal_handle);
    signal_result.map_err(|e| task_err("signal", e))??;
    let stats = scheduler_result.map_err(|e| task_err("scheduler", e))??;
    tracing::info!(
        "scheduler stopped after {} successful and {} failed passes",
        stats.succeeded,
        stats.failed
    );
    Ok(stats)
}

/// Call `pass` on a blocking thread immediately and then on every tick.
///
/// A failed pass is logged and the next tick tries again. Returns when
/// `shutdown` fires; a pass already running is allowed to finish.
pub async fn run_periodically<F>(
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
    pass: F,
) -> Result<PassStats, DaemonError>
where
    F: Fn() -> Result<SyncReport, SyncError> + Send + Sync + 'static,
{
    let pass = Arc::new(pass);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats = PassStats::default();

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let pass = pass.clone();
                let outcome = tokio::task::spawn_blocking(move || (*pass)())
                    .await
                    .map_err(|e| task_err("sync pass", e))?;
                match outcome {
                    Ok(report) => {
                        stats.succeeded += 1;
                        tracing::info!(
                            inserted = report.inserted,
                            updated = report.updated,
                            skipped = report.skipped,
                            "sync pass complete"
                        );
                    }
                    Err(err) => {
                        stats.failed += 1;
                        tracing::error!("sync pass failed: {err}");
                    }
                }
            }
        }
    }

    Ok(stats)
}

/// One pass against ClinicCards and the Google Sheets report.
pub fn live_pass(settings: &Settings) -> Result<SyncReport, SyncError> {
    let source = ClinicCardsSource::new(&settings.clinic_cards);
    let mut client = ThrottledRetryClient::from_settings(SheetsTable::new(&settings.sheet), settings);
    let today = chrono::Local::now().date_naive();
    pipeline::run(&source, &mut client, settings, today)
}

/// Pass interval from an optional override or the settings, at least a minute.
pub fn interval_from(settings: &Settings, minutes: Option<u64>) -> Duration {
    let minutes = minutes.unwrap_or(settings.sync.interval_minutes).max(1);
    Duration::from_secs(minutes * 60)
}

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
