//! # clinisync-remote
//!
//! Blocking HTTP transports: the clinic-management record API
//! ([`ClinicCardsSource`]) and the spreadsheet holding the report
//! ([`SheetsTable`]).

pub mod clinic_cards;
pub mod error;
pub mod grid;
mod lenient;
pub mod sheets;

pub use clinic_cards::ClinicCardsSource;
pub use error::RemoteError;
pub use sheets::SheetsTable;
