//! Settings file: credentials, report layout and sync policy.
//!
//! # Storage layout
//!
//! ```text
//! ~/.clinisync/
//!   settings.yaml   (mode 0600, created by `clinisync init`)
//! ```
//!
//! # API pattern
//!
//! Every function touching disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Credentials may also come from the environment (`CLINICS_CARD_API_KEY`,
//! `GOOGLE_SPREADSHEET_KEY`, `GOOGLE_WORKSHEET_NAME`, `GOOGLE_ACCESS_TOKEN`);
//! environment values win over the file.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::types::DateRange;

/// Default anchor label for a half-year block.
pub const DEFAULT_PERIOD_LABEL_TEMPLATE: &str = "{half} полугодие {year}";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicCardsSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for ClinicCardsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://cliniccards.com/api".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    pub base_url: String,
    pub spreadsheet_key: String,
    pub worksheet_name: String,
    /// Pre-issued OAuth bearer token.
    pub access_token: String,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            spreadsheet_key: String::new(),
            worksheet_name: String::new(),
            access_token: String::new(),
        }
    }
}

/// How an aggregated patient is matched against an existing report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatientMatch {
    /// Exact match of the patient code inside `code_column`.
    #[default]
    Code,
    /// Exact match of `"{last} {first}"` anywhere in the sheet.
    FullName,
}

/// Physical layout of the report table (all indices 1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Last header row; the first inserted patient lands right below it.
    pub header_row: u32,
    /// Row holding the per-day column headers.
    pub date_header_row: u32,
    /// Row receiving the distinct-payer count per day.
    pub month_count_row: u32,
    pub name_column: u32,
    pub code_column: u32,
    pub curator_column: u32,
    pub doctor_column: u32,
    pub visits_count_column: u32,
    pub treatment_plan_column: u32,
    /// `{half}` and `{year}` are substituted.
    pub period_label_template: String,
    pub patient_match: PatientMatch,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            header_row: 7,
            date_header_row: 3,
            month_count_row: 4,
            name_column: 3,
            code_column: 4,
            curator_column: 5,
            doctor_column: 6,
            visits_count_column: 7,
            treatment_plan_column: 10,
            period_label_template: DEFAULT_PERIOD_LABEL_TEMPLATE.to_string(),
            patient_match: PatientMatch::Code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Records created before this day are not aggregated; also the start of
    /// every record fetch window.
    pub cutoff_date: NaiveDate,
    /// Daemon cadence.
    pub interval_minutes: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            cutoff_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            interval_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per remote call.
    pub attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_secs: 10,
        }
    }
}

/// Root of `settings.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub clinic_cards: ClinicCardsSettings,
    pub sheet: SheetSettings,
    pub layout: Layout,
    pub sync: SyncSettings,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
}

impl Settings {
    /// Overlay credentials from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str, slot: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        };
        set("CLINICS_CARD_API_KEY", &mut self.clinic_cards.api_key);
        set("GOOGLE_SPREADSHEET_KEY", &mut self.sheet.spreadsheet_key);
        set("GOOGLE_WORKSHEET_NAME", &mut self.sheet.worksheet_name);
        set("GOOGLE_ACCESS_TOKEN", &mut self.sheet.access_token);
    }

    /// Check what fetching records needs.
    pub fn validate_source(&self) -> Result<(), SettingsError> {
        require("clinic_cards.base_url", &self.clinic_cards.base_url)?;
        require("clinic_cards.api_key", &self.clinic_cards.api_key)
    }

    /// Check what talking to the report table needs, plus policy sanity.
    pub fn validate_table(&self) -> Result<(), SettingsError> {
        require("sheet.base_url", &self.sheet.base_url)?;
        require("sheet.spreadsheet_key", &self.sheet.spreadsheet_key)?;
        require("sheet.worksheet_name", &self.sheet.worksheet_name)?;
        require("sheet.access_token", &self.sheet.access_token)?;

        if self.throttle.max_requests == 0 {
            return Err(invalid("throttle.max_requests", "must be at least 1"));
        }
        if self.throttle.window_secs == 0 {
            return Err(invalid("throttle.window_secs", "must be at least 1"));
        }
        if self.retry.attempts == 0 {
            return Err(invalid("retry.attempts", "must be at least 1"));
        }
        if !self.layout.period_label_template.contains("{half}") {
            return Err(invalid(
                "layout.period_label_template",
                "must contain {half}",
            ));
        }
        Ok(())
    }

    /// Full validation for a synchronization run.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.validate_source()?;
        self.validate_table()
    }

    /// Record fetch window: cutoff date through `today`.
    pub fn fetch_range(&self, today: NaiveDate) -> DateRange {
        DateRange {
            from: self.sync.cutoff_date,
            to: today,
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Paths
// ---------------------------------------------------------------------------

/// `<home>/.clinisync/`: pure, no I/O.
pub fn settings_dir_at(home: &Path) -> PathBuf {
    home.join(".clinisync")
}

/// `<home>/.clinisync/settings.yaml`: pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    settings_dir_at(home).join("settings.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load `settings.yaml` without consulting the environment.
///
/// Returns `SettingsError::SettingsNotFound` if absent,
/// `SettingsError::Parse` (with path + line context) if malformed YAML.
pub fn load_file_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Err(SettingsError::SettingsNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse { path, source: e })
}

/// Load `settings.yaml` and overlay credentials from the process environment.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let mut settings = load_file_at(home)?;
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save settings to `<home>/.clinisync/settings.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let dir = settings_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = settings_path_at(home);
    let tmp_path = path.with_file_name("settings.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), SettingsError> {
    save_at(&home()?, settings)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write default settings if none exist.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path) -> Result<Settings, SettingsError> {
    if settings_path_at(home).exists() {
        return load_file_at(home);
    }
    let settings = Settings::default();
    save_at(home, &settings)?;
    Ok(settings)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<Settings, SettingsError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

fn require(field: &'static str, value: &str) -> Result<(), SettingsError> {
    if value.trim().is_empty() {
        return Err(SettingsError::Missing { field });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
