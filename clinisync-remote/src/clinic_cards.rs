//! ClinicCards REST client implementing [`RecordSource`].
//!
//! Every endpoint answers `{"data": [...]}`. Date-filtered endpoints take
//! `from`/`to` query parameters in `YYYY-MM-DD` form.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use clinisync_core::settings::ClinicCardsSettings;
use clinisync_core::types::{DateRange, Invoice, Patient, Payment, Plan, Visit};
use clinisync_sync::RecordSource;

use crate::error::{http_err, RemoteError};
use crate::lenient;

const PAYMENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const INVOICE_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct ClinicCardsSource {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl ClinicCardsSource {
    pub fn new(settings: &ClinicCardsSettings) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            api_key: settings.api_key.clone(),
        }
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<T>, RemoteError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self
            .agent
            .get(&url)
            .set("Token", &self.api_key)
            .set("Content-Type", "application/json");
        if let Some(range) = range {
            request = request
                .query("from", &range.from.to_string())
                .query("to", &range.to.to_string());
        }
        let response = request.call().map_err(|e| http_err(&url, e))?;
        let envelope: Envelope<T> = response
            .into_json()
            .map_err(|source| RemoteError::Decode {
                url: url.clone(),
                source,
            })?;
        tracing::debug!("{} returned {} records", url, envelope.data.len());
        Ok(envelope.data)
    }
}

impl RecordSource for ClinicCardsSource {
    type Error = RemoteError;

    fn patients(&self) -> Result<Vec<Patient>, RemoteError> {
        let raw: Vec<RawPatient> = self.fetch("patients", None)?;
        Ok(raw.into_iter().map(RawPatient::into_domain).collect())
    }

    fn visits(&self, range: DateRange) -> Result<Vec<Visit>, RemoteError> {
        let raw: Vec<RawVisit> = self.fetch("visits", Some(range))?;
        Ok(raw.into_iter().map(RawVisit::into_domain).collect())
    }

    fn payments(&self, range: DateRange) -> Result<Vec<Payment>, RemoteError> {
        let raw: Vec<RawPayment> = self.fetch("payments", Some(range))?;
        raw.into_iter().map(RawPayment::into_domain).collect()
    }

    fn plans(&self, range: DateRange) -> Result<Vec<Plan>, RemoteError> {
        let raw: Vec<RawPlan> = self.fetch("plans", Some(range))?;
        Ok(raw.into_iter().map(RawPlan::into_domain).collect())
    }

    fn invoices(&self, range: DateRange) -> Result<Vec<Invoice>, RemoteError> {
        let raw: Vec<RawInvoice> = self.fetch("invoices", Some(range))?;
        raw.into_iter().map(RawInvoice::into_domain).collect()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawPatient {
    #[serde(deserialize_with = "lenient::id")]
    patient_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    firstname: String,
    #[serde(default, deserialize_with = "lenient::text")]
    lastname: String,
    #[serde(default, deserialize_with = "lenient::text")]
    code: String,
    #[serde(default, deserialize_with = "lenient::text")]
    curator: String,
    #[serde(default)]
    first_visit_date: Option<String>,
    #[serde(default)]
    last_visit_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_id")]
    main_plans_id: Option<String>,
}

impl RawPatient {
    fn into_domain(self) -> Patient {
        Patient {
            id: self.patient_id.into(),
            first_name: self.firstname,
            last_name: self.lastname,
            code: self.code,
            curator: self.curator,
            first_visit_date: self.first_visit_date,
            last_visit_date: self.last_visit_date,
            main_plan_id: self.main_plans_id.map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVisit {
    #[serde(deserialize_with = "lenient::id")]
    visit_id: String,
    #[serde(deserialize_with = "lenient::id")]
    patient_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    status: String,
    #[serde(default, deserialize_with = "lenient::text")]
    doctor: String,
    #[serde(default, deserialize_with = "lenient::text")]
    date_created: String,
    #[serde(default)]
    visit_start: Option<String>,
    #[serde(default)]
    visit_end: Option<String>,
}

impl RawVisit {
    fn into_domain(self) -> Visit {
        Visit {
            id: self.visit_id,
            patient_id: self.patient_id.into(),
            status: self.status,
            doctor: self.doctor,
            date_created: self.date_created,
            visit_start: self.visit_start,
            visit_end: self.visit_end,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCashDesk {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    #[serde(deserialize_with = "lenient::id")]
    payment_id: String,
    #[serde(deserialize_with = "lenient::id")]
    patient_id: String,
    #[serde(deserialize_with = "lenient::text")]
    amount: String,
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    kind: String,
    date_created: String,
    #[serde(default)]
    cash_desk: Option<RawCashDesk>,
}

impl RawPayment {
    fn into_domain(self) -> Result<Payment, RemoteError> {
        // Time of day is dropped so same-day payments merge.
        let date_created = NaiveDateTime::parse_from_str(&self.date_created, PAYMENT_DATE_FORMAT)
            .map(|at| at.date())
            .map_err(|_| RemoteError::Field {
                entity: "payment",
                id: self.payment_id.clone(),
                field: "date_created",
                value: self.date_created.clone(),
            })?;
        let desk = self.cash_desk.unwrap_or_default();
        Ok(Payment {
            id: self.payment_id,
            patient_id: self.patient_id.into(),
            amount: self.amount,
            kind: self.kind,
            currency: desk.currency,
            status: desk.status,
            date_created,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(deserialize_with = "lenient::id")]
    plan_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    plan_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    doctor_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    plan_total: String,
    #[serde(default, deserialize_with = "lenient::text")]
    plan_total_with_discount: String,
}

impl RawPlan {
    fn into_domain(self) -> Plan {
        Plan {
            id: self.plan_id.into(),
            name: self.plan_name,
            doctor_id: self.doctor_id,
            plan_total: self.plan_total,
            plan_total_with_discount: self.plan_total_with_discount,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    #[serde(deserialize_with = "lenient::id")]
    id: String,
    #[serde(deserialize_with = "lenient::id")]
    patient_id: String,
    #[serde(deserialize_with = "lenient::text")]
    amount: String,
    date_created: String,
}

impl RawInvoice {
    fn into_domain(self) -> Result<Invoice, RemoteError> {
        let date_created = NaiveDate::parse_from_str(&self.date_created, INVOICE_DATE_FORMAT)
            .map_err(|_| RemoteError::Field {
                entity: "invoice",
                id: self.id.clone(),
                field: "date_created",
                value: self.date_created.clone(),
            })?;
        Ok(Invoice {
            id: self.id,
            patient_id: self.patient_id.into(),
            amount: self.amount,
            date_created,
        })
    }
}
