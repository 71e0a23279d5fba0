//! Clinisync core library: domain types, settings persistence, errors.
//!
//! Public API surface:
//! - [`types`]: clinic records, patient aggregates, table coordinates
//! - [`error`]: [`SettingsError`], [`ParseAmountError`]
//! - [`settings`]: load / save / init of `~/.clinisync/settings.yaml`

pub mod error;
pub mod settings;
pub mod types;

pub use error::{ParseAmountError, SettingsError};
pub use settings::{
    ClinicCardsSettings, Layout, PatientMatch, RetrySettings, Settings, SheetSettings,
    SyncSettings, ThrottleSettings,
};
pub use types::{
    CellUpdate, DateRange, Invoice, PatientAggregate, Patient, PatientId, Payment, PeriodLabel,
    Plan, PlanId, TableCoordinate, Visit,
};
