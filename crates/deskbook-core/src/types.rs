use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::time::parse_date;

/// Bearer token observed in the user's browser session.
///
/// Overwritten wholesale on every capture; an empty token is never usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    #[serde(default)]
    pub auxiliary_headers: BTreeMap<String, String>,
    pub captured_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, auxiliary_headers: BTreeMap<String, String>) -> Self {
        Self {
            token: token.into(),
            auxiliary_headers,
            captured_at: Utc::now(),
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Address fragments the platform embeds in booking confirmation mails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailAddress {
    #[serde(default)]
    pub location_address: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub location_city: String,
    #[serde(default)]
    pub location_country: String,
    #[serde(default)]
    pub location_state: String,
}

impl MailAddress {
    fn merged_over(&self, base: &MailAddress) -> MailAddress {
        MailAddress {
            location_address: prefer(&self.location_address, &base.location_address),
            location_name: prefer(&self.location_name, &base.location_name),
            location_city: prefer(&self.location_city, &base.location_city),
            location_country: prefer(&self.location_country, &base.location_country),
            location_state: prefer(&self.location_state, &base.location_state),
        }
    }
}

/// A bookable coworking location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub space_id: String,
    /// Platform-internal space UUID (`WeWorkSpaceID` on the wire).
    #[serde(default)]
    pub provider_space_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub mail_data: MailAddress,
}

impl Location {
    /// Overlay `self` on `base`: every empty field falls back to `base`.
    pub fn merged_over(&self, base: &Location) -> Location {
        Location {
            name: prefer(&self.name, &base.name),
            location_id: prefer(&self.location_id, &base.location_id),
            space_id: prefer(&self.space_id, &base.space_id),
            provider_space_id: prefer(&self.provider_space_id, &base.provider_space_id),
            city: self.city.clone().or_else(|| base.city.clone()),
            country: self.country.clone().or_else(|| base.country.clone()),
            mail_data: self.mail_data.merged_over(&base.mail_data),
        }
    }

    /// Key used to collapse duplicates found while scraping a page.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.name.clone(),
            self.location_id.clone(),
            self.space_id.clone(),
        )
    }

    /// Case-insensitive substring match against name and city.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self
                .city
                .as_deref()
                .is_some_and(|city| city.to_lowercase().contains(&query))
    }
}

fn prefer(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// A reservation known to exist, either booked here or discovered remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub provider_space_id: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(default, rename = "uuid", skip_serializing_if = "Option::is_none")]
    pub remote_uuid: Option<String>,
}

/// Identity of a [`BookingRecord`] for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BookingKey {
    Remote(String),
    Local {
        date: NaiveDate,
        location_id: String,
        space_id: String,
    },
}

impl BookingRecord {
    pub fn for_location(date: NaiveDate, location: &Location) -> Self {
        Self {
            date,
            location_id: location.location_id.clone(),
            space_id: location.space_id.clone(),
            provider_space_id: location.provider_space_id.clone(),
            location_name: location.name.clone(),
            remote_uuid: None,
        }
    }

    pub fn identity_key(&self) -> BookingKey {
        match self.remote_uuid.as_deref().filter(|uuid| !uuid.is_empty()) {
            Some(uuid) => BookingKey::Remote(uuid.to_string()),
            None => self.local_key(),
        }
    }

    fn local_key(&self) -> BookingKey {
        BookingKey::Local {
            date: self.date,
            location_id: self.location_id.clone(),
            space_id: self.space_id.clone(),
        }
    }

    /// Two records denote the same reservation when their remote UUIDs agree
    /// or, failing that, their (date, location, space) tuples agree.
    pub fn same_booking(&self, other: &BookingRecord) -> bool {
        self.identity_key() == other.identity_key() || self.local_key() == other.local_key()
    }
}

/// A scheduled local notification for an upcoming booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub booking_date: NaiveDate,
    pub fire_at: DateTime<Utc>,
    pub lead_days: u32,
    pub alarm_name: String,
}

impl Reminder {
    const ALARM_PREFIX: &'static str = "reminder-";

    pub fn alarm_name_for(booking_date: NaiveDate, lead_days: u32) -> String {
        format!("{}{}-{}", Self::ALARM_PREFIX, booking_date, lead_days)
    }

    /// Inverse of [`Reminder::alarm_name_for`].
    pub fn parse_alarm_name(name: &str) -> Option<(NaiveDate, u32)> {
        let rest = name.strip_prefix(Self::ALARM_PREFIX)?;
        let (date, lead) = rest.rsplit_once('-')?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let lead = lead.parse().ok()?;
        Some((date, lead))
    }
}

/// Per-date classification produced by a booking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOutcome {
    Success,
    Failed,
    SkippedAlreadyBooked,
}

impl std::fmt::Display for BookingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::SkippedAlreadyBooked => write!(f, "already booked"),
        }
    }
}

/// Overall shape of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AllSucceeded,
    AllFailed,
    Partial,
}

/// Session-scoped result of one booking run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub successful: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
    pub already_booked: Vec<NaiveDate>,
    /// Dates never attempted: past dates and the skipped non-working day.
    pub excluded: Vec<NaiveDate>,
}

impl BookingSummary {
    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn already_booked_count(&self) -> usize {
        self.already_booked.len()
    }

    pub fn status(&self) -> RunStatus {
        if self.failed.is_empty() {
            RunStatus::AllSucceeded
        } else if self.successful.is_empty() {
            RunStatus::AllFailed
        } else {
            RunStatus::Partial
        }
    }

    /// Reminders are only offered when something was actually booked.
    pub fn offers_reminders(&self) -> bool {
        !self.successful.is_empty()
    }
}

/// Dates picked by the user for the current session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateSelection {
    dates: BTreeSet<NaiveDate>,
}

impl DateSelection {
    pub fn parse<'a>(raw: impl IntoIterator<Item = &'a str>) -> AppResult<Self> {
        let dates = raw
            .into_iter()
            .map(parse_date)
            .collect::<AppResult<BTreeSet<_>>>()?;
        Ok(Self { dates })
    }

    /// Selected dates in ascending order.
    pub fn sorted(&self) -> Vec<NaiveDate> {
        self.dates.iter().copied().collect()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
