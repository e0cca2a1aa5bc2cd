//! User configuration (`~/.config/deskbook/config.toml`) and XDG paths.

pub mod config;
pub mod paths;

pub use config::{
    BookingConfig, DeskbookConfig, LocationConfig, NotificationPermission, PlatformConfig,
    ReminderConfig, SiteConfig, StorageConfig,
};
