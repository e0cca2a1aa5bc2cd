use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, Weekday};
use deskbook_config::{BookingConfig, SiteConfig};
use deskbook_core::time::{format_day_long, format_time_12h, format_utc_millis, local_to_utc};
use deskbook_core::{AppResult, Location};
use serde::Serialize;

/// Local wall-clock reservation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Which window applies to which weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationHours {
    pub regular: BookingWindow,
    pub short_day: Weekday,
    pub short: BookingWindow,
}

impl ReservationHours {
    pub fn from_config(config: &BookingConfig) -> AppResult<Self> {
        let (start, end) = config.weekday_window()?;
        let (short_start, short_end) = config.short_day_window()?;
        Ok(Self {
            regular: BookingWindow { start, end },
            short_day: config.short_day()?,
            short: BookingWindow {
                start: short_start,
                end: short_end,
            },
        })
    }

    pub fn window_for(&self, date: NaiveDate) -> BookingWindow {
        if date.weekday() == self.short_day {
            self.short
        } else {
            self.regular
        }
    }
}

/// The site's timezone as the booking API wants to be told about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTimezone {
    pub offset: FixedOffset,
    pub label: String,
    pub iana: String,
    pub windows: String,
}

impl SiteTimezone {
    pub fn from_config(config: &SiteConfig) -> AppResult<Self> {
        Ok(Self {
            offset: config.offset()?,
            label: config.timezone_label.clone(),
            iana: config.timezone_iana.clone(),
            windows: config.timezone_windows.clone(),
        })
    }
}

/// Body of `POST /workplaceone/api/common-booking/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BookingRequest {
    pub application_type: &'static str,
    pub platform_type: &'static str,
    pub space_type: u32,
    #[serde(rename = "ReservationID")]
    pub reservation_id: String,
    pub trigger_calendar_event: bool,
    pub notes: Option<String>,
    pub mail_data: MailData,
    pub location_type: u32,
    #[serde(rename = "UTCOffset")]
    pub utc_offset: String,
    pub credit_ratio: u32,
    #[serde(rename = "LocationID")]
    pub location_id: String,
    #[serde(rename = "SpaceID")]
    pub space_id: String,
    #[serde(rename = "WeWorkSpaceID")]
    pub provider_space_id: String,
    pub start_time: String,
    pub end_time: String,
}

/// Text the platform renders into its confirmation mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailData {
    pub day_formatted: String,
    pub start_time_formatted: String,
    pub end_time_formatted: String,
    pub floor_address: String,
    pub location_address: String,
    pub credits_used: String,
    #[serde(rename = "Capacity")]
    pub capacity: String,
    #[serde(rename = "TimezoneUsed")]
    pub timezone_used: String,
    #[serde(rename = "TimezoneIana")]
    pub timezone_iana: String,
    #[serde(rename = "TimezoneWin")]
    pub timezone_win: String,
    pub start_date_time: String,
    pub end_date_time: String,
    pub location_name: String,
    pub location_city: String,
    pub location_country: String,
    pub location_state: String,
}

impl BookingRequest {
    pub fn new(
        date: NaiveDate,
        location: &Location,
        window: BookingWindow,
        timezone: &SiteTimezone,
    ) -> Self {
        let start = local_to_utc(timezone.offset, date, window.start);
        let end = local_to_utc(timezone.offset, date, window.end);
        let mail = &location.mail_data;

        Self {
            application_type: "WorkplaceOne",
            platform_type: "WEB",
            space_type: 4,
            reservation_id: String::new(),
            trigger_calendar_event: true,
            notes: None,
            mail_data: MailData {
                day_formatted: format_day_long(date),
                start_time_formatted: format_time_12h(window.start),
                end_time_formatted: format_time_12h(window.end),
                floor_address: String::new(),
                location_address: mail.location_address.clone(),
                credits_used: "0".into(),
                capacity: "1".into(),
                timezone_used: timezone.label.clone(),
                timezone_iana: timezone.iana.clone(),
                timezone_win: timezone.windows.clone(),
                start_date_time: format!("{} {}", date, window.start.format("%H:%M")),
                end_date_time: format!("{} {}", date, window.end.format("%H:%M")),
                location_name: mail.location_name.clone(),
                location_city: mail.location_city.clone(),
                location_country: mail.location_country.clone(),
                location_state: mail.location_state.clone(),
            },
            location_type: 3,
            utc_offset: timezone.offset.to_string(),
            credit_ratio: 1000,
            location_id: location.location_id.clone(),
            space_id: location.space_id.clone(),
            provider_space_id: location.provider_space_id.clone(),
            start_time: format_utc_millis(start),
            end_time: format_utc_millis(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskbook_config::DeskbookConfig;
    use serde_json::json;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn fixtures() -> (ReservationHours, SiteTimezone, Location) {
        let config = DeskbookConfig::default();
        (
            ReservationHours::from_config(&config.booking).unwrap(),
            SiteTimezone::from_config(&config.site).unwrap(),
            config.default_location(),
        )
    }

    #[test]
    fn test_short_day_uses_short_window() {
        let (hours, _, _) = fixtures();
        // 2025-03-15 is a Saturday.
        let saturday = hours.window_for(date("2025-03-15"));
        assert_eq!(saturday.end, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        let monday = hours.window_for(date("2025-03-10"));
        assert_eq!(monday.end, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn test_request_wire_shape() {
        let (hours, timezone, location) = fixtures();
        let day = date("2025-03-10");
        let request = BookingRequest::new(day, &location, hours.window_for(day), &timezone);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["ApplicationType"], "WorkplaceOne");
        assert_eq!(body["PlatformType"], "WEB");
        assert_eq!(body["SpaceType"], 4);
        assert_eq!(body["ReservationID"], "");
        assert_eq!(body["TriggerCalendarEvent"], true);
        assert_eq!(body["Notes"], json!(null));
        assert_eq!(body["LocationType"], 3);
        assert_eq!(body["UTCOffset"], "+05:30");
        assert_eq!(body["CreditRatio"], 1000);
        assert_eq!(body["LocationID"], "ffe4017e-e45d-4c8c-b6cc-261a980583d0");
        assert_eq!(body["SpaceID"], "147");
        assert_eq!(body["WeWorkSpaceID"], "58f4a184-4a5d-11e8-b18d-0ac77f0f6524");
        assert_eq!(body["StartTime"], "2025-03-10T03:30:00.000Z");
        assert_eq!(body["EndTime"], "2025-03-10T12:30:00.000Z");

        let mail = &body["MailData"];
        assert_eq!(mail["dayFormatted"], "Monday, March 10th");
        assert_eq!(mail["startTimeFormatted"], "9:00 AM");
        assert_eq!(mail["endTimeFormatted"], "6:00 PM");
        assert_eq!(mail["floorAddress"], "");
        assert_eq!(mail["creditsUsed"], "0");
        assert_eq!(mail["Capacity"], "1");
        assert_eq!(mail["TimezoneUsed"], "GMT +05:30");
        assert_eq!(mail["TimezoneIana"], "Asia/Kolkata");
        assert_eq!(mail["TimezoneWin"], "India Standard Time");
        assert_eq!(mail["startDateTime"], "2025-03-10 09:00");
        assert_eq!(mail["endDateTime"], "2025-03-10 18:00");
        assert_eq!(mail["locationState"], "KA");
    }

    #[test]
    fn test_short_day_request_times() {
        let (hours, timezone, location) = fixtures();
        let day = date("2025-03-15");
        let request = BookingRequest::new(day, &location, hours.window_for(day), &timezone);
        assert_eq!(request.end_time, "2025-03-15T08:30:00.000Z");
        assert_eq!(request.mail_data.end_time_formatted, "2:00 PM");
    }
}
