//! Configuration for deskbook (`~/.config/deskbook/config.toml`).
//!
//! Every section is optional; a missing file yields the built-in defaults,
//! which target the WeWork India member platform.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveTime, Weekday};
use deskbook_core::time::{parse_hhmm, parse_utc_offset, parse_weekday};
use deskbook_core::{AppResult, Location, MailAddress};
use serde::{Deserialize, Serialize};

use crate::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskbookConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote endpoints and the header set the member web app sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub api_base: String,
    /// Requests to this host (or its subdomains) are inspected for tokens.
    pub capture_domain: String,
    pub catalog_base: String,
    pub build_id: String,
    pub default_city: String,
    pub user_agent: String,
    pub request_source: String,
    pub accept_language: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: "https://members.wework.com".into(),
            capture_domain: "members.wework.com".into(),
            catalog_base: "https://wework.co.in".into(),
            build_id: "TulhsZ6t_Z7i3brfoKhP8".into(),
            default_city: "bangalore".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36"
                .into(),
            request_source: "MemberWeb/WorkplaceOne/Prod".into(),
            accept_language: "en-GB,en-US;q=0.9,en;q=0.8".into(),
        }
    }
}

impl PlatformConfig {
    /// Headers sent with every API call, minus `authorization`.
    pub fn default_headers(&self) -> Vec<(String, String)> {
        let api_base = self.api_base.trim_end_matches('/');
        vec![
            ("accept".into(), "application/json, text/plain, */*".into()),
            ("accept-language".into(), self.accept_language.clone()),
            ("content-type".into(), "application/json".into()),
            ("origin".into(), api_base.to_string()),
            (
                "referer".into(),
                format!("{api_base}/workplaceone/content2/bookings/desks"),
            ),
            ("request-source".into(), self.request_source.clone()),
            ("user-agent".into(), self.user_agent.clone()),
        ]
    }
}

/// The platform's timezone. Its offset doubles as "local time".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub utc_offset: String,
    pub timezone_label: String,
    pub timezone_iana: String,
    pub timezone_windows: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+05:30".into(),
            timezone_label: "GMT +05:30".into(),
            timezone_iana: "Asia/Kolkata".into(),
            timezone_windows: "India Standard Time".into(),
        }
    }
}

impl SiteConfig {
    pub fn offset(&self) -> AppResult<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Reservation windows and the non-working-day rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub weekday_start: String,
    pub weekday_end: String,
    /// Weekday booked with the shorter window.
    pub short_day: String,
    pub short_day_start: String,
    pub short_day_end: String,
    pub skip_non_working_day: bool,
    pub non_working_day: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            weekday_start: "09:00".into(),
            weekday_end: "18:00".into(),
            short_day: "Sat".into(),
            short_day_start: "09:00".into(),
            short_day_end: "14:00".into(),
            skip_non_working_day: true,
            non_working_day: "Sun".into(),
        }
    }
}

impl BookingConfig {
    pub fn weekday_window(&self) -> AppResult<(NaiveTime, NaiveTime)> {
        Ok((parse_hhmm(&self.weekday_start)?, parse_hhmm(&self.weekday_end)?))
    }

    pub fn short_day_window(&self) -> AppResult<(NaiveTime, NaiveTime)> {
        Ok((
            parse_hhmm(&self.short_day_start)?,
            parse_hhmm(&self.short_day_end)?,
        ))
    }

    pub fn short_day(&self) -> AppResult<Weekday> {
        parse_weekday(&self.short_day)
    }

    pub fn non_working_day(&self) -> AppResult<Weekday> {
        parse_weekday(&self.non_working_day)
    }
}

/// Built-in default location; selections are merged over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub name: String,
    pub location_id: String,
    pub space_id: String,
    pub provider_space_id: String,
    pub mail_address: String,
    pub mail_name: String,
    pub mail_city: String,
    pub mail_country: String,
    pub mail_state: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: "RMZ Latitude Commercial, Bengaluru".into(),
            location_id: "ffe4017e-e45d-4c8c-b6cc-261a980583d0".into(),
            space_id: "147".into(),
            provider_space_id: "58f4a184-4a5d-11e8-b18d-0ac77f0f6524".into(),
            mail_address: "RMZ Latitude Commercial, 10th floor, Bellary Rd".into(),
            mail_name: "RMZ Latitude Commercial".into(),
            mail_city: "Bengaluru".into(),
            mail_country: "IND".into(),
            mail_state: "KA".into(),
        }
    }
}

impl LocationConfig {
    pub fn to_location(&self) -> Location {
        Location {
            name: self.name.clone(),
            location_id: self.location_id.clone(),
            space_id: self.space_id.clone(),
            provider_space_id: self.provider_space_id.clone(),
            city: None,
            country: None,
            mail_data: MailAddress {
                location_address: self.mail_address.clone(),
                location_name: self.mail_name.clone(),
                location_city: self.mail_city.clone(),
                location_country: self.mail_country.clone(),
                location_state: self.mail_state.clone(),
            },
        }
    }
}

/// State of the host's notification permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub notification_permission: NotificationPermission,
    /// Local hour of day reminders fire at.
    pub hour: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            notification_permission: NotificationPermission::Default,
            hour: 9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides `~/.local/state/deskbook/state.json`.
    pub state_file: Option<PathBuf>,
}

impl DeskbookConfig {
    /// Load from the default location. Returns `Default` if the file does not
    /// exist or the config directory cannot be determined.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse every typed value once so bad input surfaces at startup.
    pub fn validate(&self) -> AppResult<()> {
        self.site.offset()?;
        self.booking.weekday_window()?;
        self.booking.short_day_window()?;
        self.booking.short_day()?;
        self.booking.non_working_day()?;
        Ok(())
    }

    /// `~/.config/deskbook/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        paths::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn state_file(&self) -> PathBuf {
        self.storage
            .state_file
            .clone()
            .unwrap_or_else(paths::default_state_file)
    }

    pub fn default_location(&self) -> Location {
        self.location.to_location()
    }

    /// Write the commented template to `path` unless a file already exists.
    pub fn write_template(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }

    pub fn default_template() -> String {
        r#"# deskbook configuration
# Location: ~/.config/deskbook/config.toml
#
# Every section is optional. Uncomment a key to override its default.

[platform]
# api_base = "https://members.wework.com"
# capture_domain = "members.wework.com"
# catalog_base = "https://wework.co.in"
# build_id = "TulhsZ6t_Z7i3brfoKhP8"
# default_city = "bangalore"

[site]
# utc_offset = "+05:30"
# timezone_label = "GMT +05:30"
# timezone_iana = "Asia/Kolkata"
# timezone_windows = "India Standard Time"

[booking]
# weekday_start = "09:00"
# weekday_end = "18:00"
# short_day = "Sat"
# short_day_start = "09:00"
# short_day_end = "14:00"
# skip_non_working_day = true
# non_working_day = "Sun"

[location]
# name = "RMZ Latitude Commercial, Bengaluru"
# location_id = "ffe4017e-e45d-4c8c-b6cc-261a980583d0"
# space_id = "147"

[reminders]
# notification_permission = "default"  # granted | denied | default
# hour = 9

[storage]
# state_file = "/path/to/state.json"
"#
        .to_string()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
