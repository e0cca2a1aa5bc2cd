use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Weekday};
use deskbook_client::{BookingApi, BookingRequest, ReservationHours, SiteTimezone};
use deskbook_config::DeskbookConfig;
use deskbook_core::message::HostEvent;
use deskbook_core::{AppError, AppResult, BookingOutcome, BookingSummary, Clock, Location};
use deskbook_ledger::BookingLedger;
use deskbook_locations::{LocationRegistry, ensure_bookable};
use deskbook_store::CredentialStore;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Pause between consecutive booking calls.
pub const DEFAULT_SPACING: Duration = Duration::from_millis(2000);

/// Per-date progress reported while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingProgress {
    /// 1-based position among the dates actually attempted or skipped.
    pub index: usize,
    pub total: usize,
    pub date: NaiveDate,
    pub outcome: BookingOutcome,
}

impl From<BookingProgress> for HostEvent {
    fn from(progress: BookingProgress) -> Self {
        HostEvent::BookingProgress {
            index: progress.index,
            total: progress.total,
            date: progress.date,
            outcome: progress.outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub hours: ReservationHours,
    pub timezone: SiteTimezone,
    pub non_working_day: Weekday,
    pub skip_non_working_day: bool,
    pub spacing: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &DeskbookConfig) -> AppResult<Self> {
        Ok(Self {
            hours: ReservationHours::from_config(&config.booking)?,
            timezone: SiteTimezone::from_config(&config.site)?,
            non_working_day: config.booking.non_working_day()?,
            skip_non_working_day: config.booking.skip_non_working_day,
            spacing: DEFAULT_SPACING,
        })
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Executes booking runs: one paced POST per selected date.
///
/// At most one run is in flight per orchestrator; a second call while a run
/// is active is ignored. Per-date failures never abort the run.
pub struct BookingOrchestrator {
    credentials: CredentialStore,
    registry: Arc<LocationRegistry>,
    ledger: Arc<BookingLedger>,
    api: Arc<dyn BookingApi>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    running: AtomicBool,
    confirmations: Mutex<JoinSet<()>>,
}

impl BookingOrchestrator {
    pub fn new(
        credentials: CredentialStore,
        registry: Arc<LocationRegistry>,
        ledger: Arc<BookingLedger>,
        api: Arc<dyn BookingApi>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            credentials,
            registry,
            ledger,
            api,
            clock,
            settings,
            running: AtomicBool::new(false),
            confirmations: Mutex::new(JoinSet::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Book every date in `dates` at the active location.
    ///
    /// Returns `Ok(None)` when another run is already in flight. Fails up
    /// front without any network call when no token is stored or the active
    /// location lacks booking ids.
    pub async fn run(
        &self,
        dates: &[NaiveDate],
        skip_non_working_day: Option<bool>,
        progress: Option<mpsc::UnboundedSender<BookingProgress>>,
    ) -> AppResult<Option<BookingSummary>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("booking run already in progress, ignoring request");
            return Ok(None);
        }
        let _guard = RunGuard(&self.running);

        let token = self
            .credentials
            .token()
            .map_err(|e| AppError::Storage(format!("{e:#}")))?
            .ok_or(AppError::AuthMissing)?;
        let location = self.registry.active_location();
        ensure_bookable(&location)?;

        let skip = skip_non_working_day.unwrap_or(self.settings.skip_non_working_day);
        let mut summary = BookingSummary::default();
        let attempts = self.partition(dates, skip, &mut summary);
        let total = attempts.len() + summary.already_booked.len();
        info!(
            location = %location.name,
            attempts = attempts.len(),
            already_booked = summary.already_booked.len(),
            excluded = summary.excluded.len(),
            "starting booking run"
        );

        let mut index = 0;
        for date in summary.already_booked.clone() {
            index += 1;
            report(&progress, index, total, date, BookingOutcome::SkippedAlreadyBooked);
        }

        for (position, date) in attempts.iter().enumerate() {
            let outcome = match self.book_one(&token, *date, &location).await {
                Ok(()) => {
                    summary.successful.push(*date);
                    self.spawn_confirmation(*date);
                    BookingOutcome::Success
                }
                Err(error) => {
                    warn!(date = %date, %error, "booking failed");
                    summary.failed.push(*date);
                    BookingOutcome::Failed
                }
            };
            index += 1;
            report(&progress, index, total, *date, outcome);

            if position + 1 < attempts.len() {
                tokio::time::sleep(self.settings.spacing).await;
            }
        }

        if let Err(error) = self
            .ledger
            .record_successes(&summary.successful, &location)
        {
            warn!(%error, "could not persist booked dates");
        }

        info!(
            successful = summary.success_count(),
            failed = summary.failed_count(),
            already_booked = summary.already_booked_count(),
            status = ?summary.status(),
            "booking run finished"
        );
        Ok(Some(summary))
    }

    /// Split `dates` into attempts, filling the excluded and already-booked
    /// lists of `summary`. Attempts come back ascending and deduplicated.
    fn partition(
        &self,
        dates: &[NaiveDate],
        skip_non_working_day: bool,
        summary: &mut BookingSummary,
    ) -> Vec<NaiveDate> {
        let today = self.clock.today();
        let booked = self.ledger.booked_dates();

        let mut sorted = dates.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut attempts = Vec::with_capacity(sorted.len());
        for date in sorted {
            if date < today
                || (skip_non_working_day && date.weekday() == self.settings.non_working_day)
            {
                summary.excluded.push(date);
            } else if booked.contains(&date) {
                summary.already_booked.push(date);
            } else {
                attempts.push(date);
            }
        }
        attempts
    }

    async fn book_one(&self, token: &str, date: NaiveDate, location: &Location) -> AppResult<()> {
        let window = self.settings.hours.window_for(date);
        let request = BookingRequest::new(date, location, window, &self.settings.timezone);
        debug!(
            date = %date,
            start = %request.start_time,
            end = %request.end_time,
            "posting booking"
        );
        self.api.create_booking(token, &request).await
    }

    /// Wait up to `bound` for outstanding confirmation checks. Whatever is
    /// still running afterwards is aborted.
    pub async fn settle_confirmations(&self, bound: Duration) {
        let mut pending = std::mem::take(
            &mut *self
                .confirmations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if pending.is_empty() {
            return;
        }
        let drained = tokio::time::timeout(bound, async {
            while pending.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!(
                unfinished = pending.len(),
                "abandoning confirmation checks still in flight"
            );
        }
    }

    // Diagnostic only: the 2xx already counted as a success.
    fn spawn_confirmation(&self, date: NaiveDate) {
        let ledger = Arc::clone(&self.ledger);
        let mut confirmations = self
            .confirmations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while confirmations.try_join_next().is_some() {}
        confirmations.spawn(async move {
            if ledger.confirm(date).await {
                debug!(date = %date, "booking confirmed remotely");
            } else {
                warn!(date = %date, "booking not visible in upcoming bookings yet");
            }
        });
    }
}

fn report(
    progress: &Option<mpsc::UnboundedSender<BookingProgress>>,
    index: usize,
    total: usize,
    date: NaiveDate,
    outcome: BookingOutcome,
) {
    if let Some(sender) = progress {
        // A closed receiver only means nobody is watching.
        let _ = sender.send(BookingProgress {
            index,
            total,
            date,
            outcome,
        });
    }
}

impl std::fmt::Debug for BookingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingOrchestrator")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
