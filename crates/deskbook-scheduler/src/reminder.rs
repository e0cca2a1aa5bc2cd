use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use deskbook_config::NotificationPermission;
use deskbook_core::time::{format_date_short, local_to_utc};
use deskbook_core::{AppError, AppResult, Clock, Reminder};
use deskbook_ledger::BookingLedger;
use deskbook_locations::LocationRegistry;
use deskbook_store::StateStore;
use tracing::{debug, info, warn};

use crate::host::{AlarmHost, Notifier};

pub const REMINDER_TITLE: &str = "Desk booking reminder";
pub const SCHEDULED_TITLE: &str = "Booking reminder set";

/// `lead_days` before `booking_date`, at `hour:00` site-local time.
pub fn reminder_fire_at(
    booking_date: NaiveDate,
    lead_days: u32,
    hour: u32,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let day = booking_date.checked_sub_days(Days::new(u64::from(lead_days)))?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Some(local_to_utc(offset, day, time))
}

/// Arms reminder alarms ahead of booked dates and turns fired alarms into
/// notifications.
pub struct ReminderScheduler {
    state: StateStore,
    ledger: Arc<BookingLedger>,
    registry: Arc<LocationRegistry>,
    alarms: Arc<dyn AlarmHost>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    hour: u32,
}

impl ReminderScheduler {
    pub fn new(
        state: StateStore,
        ledger: Arc<BookingLedger>,
        registry: Arc<LocationRegistry>,
        alarms: Arc<dyn AlarmHost>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        hour: u32,
    ) -> Self {
        Self {
            state,
            ledger,
            registry,
            alarms,
            notifier,
            clock,
            hour,
        }
    }

    /// Schedule one reminder per date whose fire instant is still ahead.
    ///
    /// An empty `dates` falls back to the ledger's upcoming bookings. Returns
    /// the reminders created; an empty list means nothing was persisted.
    pub async fn schedule(&self, dates: &[NaiveDate], lead_days: u32) -> AppResult<Vec<Reminder>> {
        self.ensure_permission().await?;

        let mut targets = if dates.is_empty() {
            self.ledger.upcoming().into_iter().map(|r| r.date).collect()
        } else {
            dates.to_vec()
        };
        targets.sort();
        targets.dedup();

        let now = self.clock.now();
        let offset = *now.offset();
        let now = now.with_timezone(&Utc);
        let reminders: Vec<Reminder> = targets
            .into_iter()
            .filter_map(|booking_date| {
                let fire_at = reminder_fire_at(booking_date, lead_days, self.hour, offset)?;
                if fire_at <= now {
                    debug!(date = %booking_date, lead_days, "reminder would fire in the past");
                    return None;
                }
                Some(Reminder {
                    booking_date,
                    fire_at,
                    lead_days,
                    alarm_name: Reminder::alarm_name_for(booking_date, lead_days),
                })
            })
            .collect();
        if reminders.is_empty() {
            info!(lead_days, "no reminders to schedule");
            return Ok(reminders);
        }

        self.state
            .append_reminders(&reminders)
            .map_err(|e| AppError::Storage(format!("{e:#}")))?;
        for reminder in &reminders {
            self.arm(reminder).await;
        }
        info!(count = reminders.len(), lead_days, "scheduled reminders");

        let notice = format!(
            "You'll be reminded {lead_days} day(s) before {} booking(s) expire",
            reminders.len()
        );
        if let Err(error) = self.notifier.notify(SCHEDULED_TITLE, &notice).await {
            warn!(%error, "could not show reminder confirmation");
        }
        Ok(reminders)
    }

    async fn ensure_permission(&self) -> AppResult<()> {
        let mut permission = self.notifier.permission();
        if permission == NotificationPermission::Default {
            permission = self.notifier.request_permission().await;
        }
        if permission == NotificationPermission::Granted {
            Ok(())
        } else {
            warn!(?permission, "notifications not permitted, refusing to schedule reminders");
            Err(AppError::PermissionDenied)
        }
    }

    async fn arm(&self, reminder: &Reminder) {
        if let Err(error) = self
            .alarms
            .create(&reminder.alarm_name, reminder.fire_at)
            .await
        {
            warn!(alarm = %reminder.alarm_name, %error, "could not arm reminder alarm");
        }
    }

    /// Re-arm persisted reminders that have not fired yet. Returns how many.
    pub async fn restore(&self) -> AppResult<usize> {
        let now = self.clock.now().with_timezone(&Utc);
        let pending: Vec<Reminder> = self
            .state
            .reminders()
            .map_err(|e| AppError::Storage(format!("{e:#}")))?
            .into_iter()
            .filter(|reminder| reminder.fire_at > now)
            .collect();
        for reminder in &pending {
            self.arm(reminder).await;
        }
        debug!(count = pending.len(), "restored reminder alarms");
        Ok(pending.len())
    }

    /// Build the reminder text for a fired alarm and show it.
    ///
    /// Returns `Ok(None)` for alarm names this scheduler did not create or
    /// whose reminder is no longer stored.
    pub async fn handle_alarm(&self, alarm_name: &str) -> AppResult<Option<String>> {
        let Some((booking_date, lead_days)) = Reminder::parse_alarm_name(alarm_name) else {
            debug!(alarm = %alarm_name, "ignoring foreign alarm");
            return Ok(None);
        };
        let known = self
            .state
            .reminders()
            .map_err(|e| AppError::Storage(format!("{e:#}")))?
            .iter()
            .any(|r| r.booking_date == booking_date && r.lead_days == lead_days);
        if !known {
            debug!(alarm = %alarm_name, "no stored reminder for alarm");
            return Ok(None);
        }

        let location = self.location_name_for(booking_date);
        let message = format!(
            "Your booking at {location} expires in {lead_days} day(s) on {}.",
            format_date_short(booking_date)
        );
        self.notifier.notify(REMINDER_TITLE, &message).await?;
        info!(date = %booking_date, lead_days, "reminder delivered");
        Ok(Some(message))
    }

    fn location_name_for(&self, booking_date: NaiveDate) -> String {
        self.ledger
            .upcoming()
            .into_iter()
            .find(|record| record.date == booking_date && !record.location_name.is_empty())
            .map(|record| record.location_name)
            .unwrap_or_else(|| self.registry.active_location().name)
    }
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("hour", &self.hour)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "reminder_tests.rs"]
mod tests;
