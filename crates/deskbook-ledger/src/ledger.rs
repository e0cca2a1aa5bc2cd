use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use deskbook_client::BookingApi;
use deskbook_core::{AppError, AppResult, BookingRecord, Clock, Location};
use deskbook_store::{CredentialStore, StateStore};
use tracing::{debug, info, warn};

use crate::remote::record_from_remote;

/// Durable index of booked dates.
///
/// Records are only ever appended. Reconciliation and confirmation are
/// advisory: their failures are logged and never touch stored records.
pub struct BookingLedger {
    state: StateStore,
    credentials: CredentialStore,
    api: Arc<dyn BookingApi>,
    clock: Arc<dyn Clock>,
}

impl BookingLedger {
    pub fn new(
        state: StateStore,
        credentials: CredentialStore,
        api: Arc<dyn BookingApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            credentials,
            api,
            clock,
        }
    }

    fn stored(&self) -> Vec<BookingRecord> {
        self.state.bookings().unwrap_or_else(|error| {
            warn!(error = %format!("{error:#}"), "could not read stored bookings");
            Vec::new()
        })
    }

    /// Stored records dated today or later, ascending by date.
    pub fn upcoming(&self) -> Vec<BookingRecord> {
        let today = self.clock.today();
        let mut records: Vec<BookingRecord> = self
            .stored()
            .into_iter()
            .filter(|record| record.date >= today)
            .collect();
        records.sort_by_key(|record| record.date);
        records
    }

    /// Dates today or later that already hold a booking.
    pub fn booked_dates(&self) -> BTreeSet<NaiveDate> {
        self.upcoming().into_iter().map(|record| record.date).collect()
    }

    /// Pull the platform's upcoming bookings and append the ones not yet
    /// stored. Returns how many were added; any failure counts as zero.
    pub async fn reconcile(&self, active: &Location) -> usize {
        let Some(token) = self.current_token() else {
            debug!("skipping reconciliation: not authenticated");
            return 0;
        };
        let remote = match self.api.upcoming_bookings(&token).await {
            Ok(remote) => remote,
            Err(error) => {
                warn!(%error, "reconciliation failed, keeping stored bookings");
                return 0;
            }
        };

        let today = self.clock.today();
        let offset = *self.clock.now().offset();
        let fresh: Vec<BookingRecord> = remote
            .iter()
            .filter_map(|entry| record_from_remote(entry, active, offset))
            .filter(|record| record.date >= today)
            .collect();
        if fresh.is_empty() {
            return 0;
        }

        match self.append_new(fresh) {
            Ok(added) => {
                if added > 0 {
                    info!(added, "reconciled upcoming bookings");
                }
                added
            }
            Err(error) => {
                warn!(%error, "could not persist reconciled bookings");
                0
            }
        }
    }

    /// Whether the platform lists a booking on `date`. Diagnostic only.
    pub async fn confirm(&self, date: NaiveDate) -> bool {
        let Some(token) = self.current_token() else {
            return false;
        };
        let offset = *self.clock.now().offset();
        match self.api.upcoming_bookings(&token).await {
            Ok(remote) => remote
                .iter()
                .any(|entry| entry.start_date(offset) == Some(date)),
            Err(error) => {
                warn!(%date, %error, "booking confirmation check failed");
                false
            }
        }
    }

    /// Persist a record for each successful date not already stored.
    pub fn record_successes(&self, dates: &[NaiveDate], location: &Location) -> AppResult<usize> {
        let records = dates
            .iter()
            .map(|date| BookingRecord::for_location(*date, location))
            .collect();
        self.append_new(records)
    }

    fn append_new(&self, candidates: Vec<BookingRecord>) -> AppResult<usize> {
        self.state
            .append_bookings(|existing| {
                let mut fresh: Vec<BookingRecord> = Vec::new();
                for candidate in candidates {
                    let known = existing
                        .iter()
                        .chain(fresh.iter())
                        .any(|record| record.same_booking(&candidate));
                    if !known {
                        fresh.push(candidate);
                    }
                }
                fresh
            })
            .map_err(|e| AppError::Storage(format!("{e:#}")))
    }

    fn current_token(&self) -> Option<String> {
        self.credentials.token().unwrap_or_else(|error| {
            warn!(error = %format!("{error:#}"), "could not read bearer token");
            None
        })
    }
}

impl std::fmt::Debug for BookingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
