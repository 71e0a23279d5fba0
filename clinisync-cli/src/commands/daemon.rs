//! `clinisync daemon`: periodic synchronization in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use clinisync_core::settings;
use clinisync_daemon::{interval_from, start_blocking};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Minutes between passes; overrides `sync.interval_minutes`.
    #[arg(long, value_name = "N")]
    pub interval_minutes: Option<u64>,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let settings = settings::load().context("failed to load settings")?;
        settings.validate().context("settings are incomplete")?;
        let interval = interval_from(&settings, self.interval_minutes);

        let stats = start_blocking(settings, interval).context("daemon exited with error")?;
        println!(
            "daemon stopped: {} passes succeeded, {} failed",
            stats.succeeded, stats.failed
        );
        Ok(())
    }
}
