//! Messages exchanged with the browser-side contexts (capture listener,
//! popup, page script). Every request carries an `action` discriminator.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{BookingOutcome, BookingSummary, Location, Reminder};

/// One request header as reported by the browser's request observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// One client-side storage entry from a platform page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostRequest {
    SetToken {
        token: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    GetToken,
    TokenFromPage {
        token: String,
    },
    ObserveRequest {
        url: String,
        #[serde(default)]
        request_headers: Vec<HeaderEntry>,
    },
    InspectPageStorage {
        url: String,
        #[serde(default)]
        entries: Vec<StorageEntry>,
    },
    GetAvailableLocations {
        #[serde(default)]
        city: Option<String>,
        #[serde(default)]
        page_url: Option<String>,
        #[serde(default)]
        page_html: Option<String>,
    },
    SelectLocation {
        location: Location,
    },
    GetBookedDates,
    BookDates {
        dates: Vec<NaiveDate>,
        #[serde(default)]
        skip_non_working_day: Option<bool>,
    },
    SetReminders {
        #[serde(default)]
        dates: Vec<NaiveDate>,
        lead_days: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostResponse {
    Ack {
        success: bool,
    },
    Token {
        token: Option<String>,
        headers: Option<BTreeMap<String, String>>,
    },
    Captured {
        captured: bool,
    },
    Locations {
        locations: Vec<Location>,
    },
    BookedDates {
        dates: Vec<NaiveDate>,
    },
    Booking {
        summary: BookingSummary,
    },
    Reminders {
        reminders: Vec<Reminder>,
    },
    Error {
        error: String,
    },
}

impl HostResponse {
    pub fn ok() -> Self {
        Self::Ack { success: true }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error {
            error: message.to_string(),
        }
    }
}

/// Unsolicited fire-and-forget notifications pushed to the browser side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    TokenCaptured {
        token: String,
    },
    /// Per-date result while a booking run is in flight. `index` is 1-based.
    BookingProgress {
        index: usize,
        total: usize,
        date: NaiveDate,
        outcome: BookingOutcome,
    },
    Notification {
        title: String,
        message: String,
    },
}
