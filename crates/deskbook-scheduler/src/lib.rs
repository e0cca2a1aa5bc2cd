//! Booking runs and reminder scheduling.
//!
//! [`BookingOrchestrator`] turns a date selection into paced booking calls
//! against the platform; [`ReminderScheduler`] arms local alarms ahead of
//! booked dates. Host facilities (alarms, notifications) sit behind the
//! traits in [`host`].

pub mod host;
pub mod orchestrator;
pub mod reminder;

pub use host::{AlarmHost, ConsoleNotifier, EventNotifier, Notifier, TokioAlarmHost};
pub use orchestrator::{BookingOrchestrator, BookingProgress, OrchestratorSettings};
pub use reminder::{REMINDER_TITLE, ReminderScheduler, SCHEDULED_TITLE, reminder_fire_at};
