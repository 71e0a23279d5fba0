//! `clinisync init`: create the settings file.

use anyhow::{Context, Result};
use clap::Args;

use clinisync_core::settings;

/// Create `~/.clinisync/settings.yaml` with defaults.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let path = settings::settings_path_at(&home);
        let existed = path.exists();

        settings::init_at(&home)
            .with_context(|| format!("failed to initialize settings at {}", path.display()))?;

        if existed {
            println!("✓ Settings already present at {}", path.display());
        } else {
            println!("✓ Wrote default settings to {}", path.display());
            println!("  Fill in the ClinicCards and Google Sheets credentials before syncing.");
        }
        Ok(())
    }
}
