use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use deskbook_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::booking::BookingRequest;

/// Authenticated operations against the booking API.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Submit one reservation. Any 2xx is success; other statuses map to
    /// [`AppError::RemoteRejected`], network failures to [`AppError::Transport`].
    async fn create_booking(&self, token: &str, request: &BookingRequest) -> AppResult<()>;

    /// The member's upcoming reservations as the platform reports them.
    async fn upcoming_bookings(&self, token: &str) -> AppResult<Vec<RemoteBooking>>;
}

/// One entry of the `WeWorkBookings` array. Every field is optional; the
/// platform populates different subsets depending on how a booking was made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteBooking {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, rename = "startsAt")]
    pub starts_at: Option<String>,
    #[serde(default, rename = "kubeStartDate")]
    pub kube_start_date: Option<String>,
    #[serde(default, rename = "kubeCreatedOnDate")]
    pub kube_created_on_date: Option<String>,
    #[serde(default, rename = "PropertyExternalReference")]
    pub property_external_reference: Option<String>,
    #[serde(default, rename = "SpaceExternalReference")]
    pub space_external_reference: Option<String>,
    #[serde(default)]
    pub reservable: Option<Reservable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Reservable {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub location: Option<ReservableLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReservableLocation {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RemoteBooking {
    /// First populated start field, in platform priority order.
    pub fn start_field(&self) -> Option<&str> {
        [
            &self.starts_at,
            &self.kube_start_date,
            &self.kube_created_on_date,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
    }

    /// Site-local calendar date of the booking start, if it parses.
    ///
    /// Timestamps without an explicit offset are read as site-local.
    pub fn start_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        let raw = self.start_field()?;
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&offset).date_naive());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.date());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    pub fn location_id(&self) -> Option<&str> {
        non_empty(self.property_external_reference.as_deref()).or_else(|| {
            non_empty(
                self.reservable
                    .as_ref()?
                    .location
                    .as_ref()?
                    .uuid
                    .as_deref(),
            )
        })
    }

    pub fn space_id(&self) -> Option<&str> {
        non_empty(self.space_external_reference.as_deref())
            .or_else(|| non_empty(self.reservable.as_ref()?.uuid.as_deref()))
    }

    pub fn location_name(&self) -> Option<&str> {
        non_empty(
            self.reservable
                .as_ref()?
                .location
                .as_ref()?
                .name
                .as_deref(),
        )
    }

    pub fn remote_uuid(&self) -> Option<&str> {
        non_empty(self.uuid.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct UpcomingBookingsResponse {
    #[serde(default, rename = "WeWorkBookings")]
    bookings: Option<Vec<Value>>,
}

/// Decode an upcoming-bookings body. Entries that do not decode are skipped
/// individually so one odd record cannot hide the rest.
pub fn parse_upcoming_bookings(body: &str) -> AppResult<Vec<RemoteBooking>> {
    let response: UpcomingBookingsResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Reconciliation(format!("invalid upcoming-bookings body: {e}")))?;
    let entries = response.bookings.unwrap_or_default();
    let mut bookings = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RemoteBooking>(entry) {
            Ok(booking) => bookings.push(booking),
            Err(error) => warn!(index, %error, "skipping undecodable upcoming booking"),
        }
    }
    Ok(bookings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskbook_core::time::parse_utc_offset;

    fn ist() -> FixedOffset {
        parse_utc_offset("+05:30").unwrap()
    }

    #[test]
    fn test_start_field_priority() {
        let booking = RemoteBooking {
            starts_at: Some(String::new()),
            kube_start_date: Some("2025-03-11T03:30:00Z".into()),
            kube_created_on_date: Some("2025-03-01T00:00:00Z".into()),
            ..RemoteBooking::default()
        };
        assert_eq!(booking.start_field(), Some("2025-03-11T03:30:00Z"));
    }

    #[test]
    fn test_start_date_converts_to_site_offset() {
        // 20:00 UTC on the 9th is the 10th in +05:30.
        let booking = RemoteBooking {
            starts_at: Some("2025-03-09T20:00:00.000Z".into()),
            ..RemoteBooking::default()
        };
        assert_eq!(
            booking.start_date(ist()),
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
    }

    #[test]
    fn test_start_date_without_offset_is_site_local() {
        let booking = RemoteBooking {
            kube_start_date: Some("2025-03-10T09:00:00".into()),
            ..RemoteBooking::default()
        };
        assert_eq!(
            booking.start_date(ist()),
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
    }

    #[test]
    fn test_unparseable_start_yields_none() {
        let booking = RemoteBooking {
            starts_at: Some("next tuesday".into()),
            ..RemoteBooking::default()
        };
        assert_eq!(booking.start_date(ist()), None);
        assert_eq!(RemoteBooking::default().start_date(ist()), None);
    }

    #[test]
    fn test_parse_upcoming_bookings_fields() {
        let body = r#"{
            "WeWorkBookings": [
                {
                    "uuid": "b-1",
                    "startsAt": "2025-03-10T03:30:00Z",
                    "reservable": {
                        "uuid": "space-uuid",
                        "location": {"uuid": "loc-uuid", "name": "Embassy Golf Links"}
                    }
                },
                {
                    "uuid": "b-2",
                    "kubeStartDate": "2025-03-11T03:30:00Z",
                    "PropertyExternalReference": "loc-ext",
                    "SpaceExternalReference": "147"
                },
                {"uuid": 17}
            ]
        }"#;
        let bookings = parse_upcoming_bookings(body).unwrap();
        assert_eq!(bookings.len(), 2);

        assert_eq!(bookings[0].location_id(), Some("loc-uuid"));
        assert_eq!(bookings[0].space_id(), Some("space-uuid"));
        assert_eq!(bookings[0].location_name(), Some("Embassy Golf Links"));
        assert_eq!(bookings[0].remote_uuid(), Some("b-1"));

        assert_eq!(bookings[1].location_id(), Some("loc-ext"));
        assert_eq!(bookings[1].space_id(), Some("147"));
        assert_eq!(bookings[1].location_name(), None);
    }

    #[test]
    fn test_parse_upcoming_bookings_missing_array() {
        assert!(parse_upcoming_bookings("{}").unwrap().is_empty());
        assert!(
            parse_upcoming_bookings(r#"{"WeWorkBookings": null}"#)
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            parse_upcoming_bookings("<html>"),
            Err(AppError::Reconciliation(_))
        ));
    }
}
