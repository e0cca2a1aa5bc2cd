use super::*;
use async_trait::async_trait;
use chrono::FixedOffset;
use deskbook_client::RemoteBooking;
use deskbook_core::{Credential, FixedClock, RunStatus};
use deskbook_locations::BundledCatalog;
use deskbook_store::{MemoryStore, StateStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use tokio::time::Instant;

/// Booking endpoint that accepts everything except `rejected` dates and
/// records when each call arrived.
#[derive(Default)]
struct FakeApi {
    rejected: BTreeSet<NaiveDate>,
    calls: Mutex<Vec<(String, Instant)>>,
    lookup_delay: Duration,
    lookups: AtomicUsize,
}

impl FakeApi {
    fn rejecting(dates: &[NaiveDate]) -> Self {
        Self {
            rejected: dates.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn slow_lookups(delay: Duration) -> Self {
        Self {
            lookup_delay: delay,
            ..Self::default()
        }
    }

    fn started(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(start, _)| start.clone())
            .collect()
    }

    fn instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl BookingApi for FakeApi {
    async fn create_booking(&self, _token: &str, request: &BookingRequest) -> AppResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((request.start_time.clone(), Instant::now()));
        let rejected = self
            .rejected
            .iter()
            .any(|date| request.start_time.starts_with(&date.to_string()));
        if rejected {
            Err(AppError::RemoteRejected { status: 500 })
        } else {
            Ok(())
        }
    }

    async fn upcoming_bookings(&self, _token: &str) -> AppResult<Vec<RemoteBooking>> {
        tokio::time::sleep(self.lookup_delay).await;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

struct Harness {
    api: Arc<FakeApi>,
    ledger: Arc<BookingLedger>,
    orchestrator: BookingOrchestrator,
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn harness_with(api: FakeApi, authenticated: bool, default_location: Location) -> Harness {
    let config = DeskbookConfig::default();
    let state = StateStore::new(Arc::new(MemoryStore::new()));
    let credentials = CredentialStore::new(state.clone());
    if authenticated {
        credentials
            .set(&Credential::new("abc123", BTreeMap::new()))
            .unwrap();
    }
    let offset = FixedOffset::east_opt(19_800).unwrap();
    // Sunday.
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(offset, date("2025-03-09"), 12));
    let api = Arc::new(api);
    let registry = Arc::new(LocationRegistry::new(
        state.clone(),
        Arc::new(BundledCatalog),
        Arc::new(BundledCatalog),
        default_location,
        "bangalore",
    ));
    let ledger = Arc::new(BookingLedger::new(
        state,
        credentials.clone(),
        api.clone(),
        clock.clone(),
    ));
    let orchestrator = BookingOrchestrator::new(
        credentials,
        registry,
        ledger.clone(),
        api.clone(),
        clock,
        OrchestratorSettings::from_config(&config).unwrap(),
    );
    Harness {
        api,
        ledger,
        orchestrator,
    }
}

fn harness(api: FakeApi) -> Harness {
    harness_with(api, true, DeskbookConfig::default().default_location())
}

#[tokio::test(start_paused = true)]
async fn test_run_books_ascending_with_spacing() {
    let h = harness(FakeApi::default());
    let started = Instant::now();

    let summary = h
        .orchestrator
        .run(
            &[date("2025-03-12"), date("2025-03-10"), date("2025-03-11")],
            None,
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        summary.successful,
        vec![date("2025-03-10"), date("2025-03-11"), date("2025-03-12")]
    );
    assert_eq!(summary.status(), RunStatus::AllSucceeded);
    assert_eq!(
        h.api.started(),
        vec![
            "2025-03-10T03:30:00.000Z",
            "2025-03-11T03:30:00.000Z",
            "2025-03-12T03:30:00.000Z",
        ]
    );

    let instants = h.api.instants();
    assert_eq!(instants[0] - started, Duration::ZERO);
    assert_eq!(instants[1] - instants[0], DEFAULT_SPACING);
    assert_eq!(instants[2] - instants[1], DEFAULT_SPACING);
    // No pause after the last attempt.
    assert_eq!(started.elapsed(), DEFAULT_SPACING * 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_date_does_not_stop_run() {
    let h = harness(FakeApi::rejecting(&[date("2025-03-11")]));
    let summary = h
        .orchestrator
        .run(
            &[date("2025-03-10"), date("2025-03-11"), date("2025-03-12")],
            None,
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.successful, vec![date("2025-03-10"), date("2025-03-12")]);
    assert_eq!(summary.failed, vec![date("2025-03-11")]);
    assert_eq!(summary.status(), RunStatus::Partial);

    let booked: Vec<NaiveDate> = h.ledger.booked_dates().into_iter().collect();
    assert_eq!(booked, vec![date("2025-03-10"), date("2025-03-12")]);
}

#[tokio::test(start_paused = true)]
async fn test_all_failed_records_nothing() {
    let h = harness(FakeApi::rejecting(&[date("2025-03-10")]));
    let summary = h
        .orchestrator
        .run(&[date("2025-03-10")], None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.status(), RunStatus::AllFailed);
    assert!(!summary.offers_reminders());
    assert!(h.ledger.booked_dates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_already_booked_date_is_not_posted() {
    let h = harness(FakeApi::default());
    let location = DeskbookConfig::default().default_location();
    h.ledger
        .record_successes(&[date("2025-03-10")], &location)
        .unwrap();
    let started = Instant::now();

    let summary = h
        .orchestrator
        .run(&[date("2025-03-10"), date("2025-03-11")], None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.already_booked, vec![date("2025-03-10")]);
    assert_eq!(summary.successful, vec![date("2025-03-11")]);
    assert_eq!(h.api.started().len(), 1);
    assert!(started.elapsed() < DEFAULT_SPACING);
    assert_eq!(h.ledger.upcoming().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_reclassifies_booked_dates() {
    let h = harness(FakeApi::default());
    let dates = [date("2025-03-10"), date("2025-03-11")];

    let first = h.orchestrator.run(&dates, None, None).await.unwrap().unwrap();
    assert_eq!(first.successful, dates.to_vec());
    assert_eq!(h.api.started().len(), 2);

    let started = Instant::now();
    let second = h.orchestrator.run(&dates, None, None).await.unwrap().unwrap();

    assert_eq!(h.api.started().len(), 2);
    assert_eq!(second.already_booked, dates.to_vec());
    assert!(second.successful.is_empty());
    assert!(second.failed.is_empty());
    assert!(!second.offers_reminders());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(h.ledger.upcoming().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_confirmations() {
    let h = harness(FakeApi::slow_lookups(Duration::from_secs(10)));
    let summary = h
        .orchestrator
        .run(&[date("2025-03-10"), date("2025-03-11")], None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.success_count(), 2);
    assert_eq!(h.api.lookups.load(Ordering::SeqCst), 0);

    h.orchestrator
        .settle_confirmations(Duration::from_secs(30))
        .await;
    assert_eq!(h.api.lookups.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_settle_gives_up_after_bound() {
    let h = harness(FakeApi::slow_lookups(Duration::from_secs(600)));
    h.orchestrator
        .run(&[date("2025-03-10")], None, None)
        .await
        .unwrap()
        .unwrap();

    let started = Instant::now();
    h.orchestrator
        .settle_confirmations(Duration::from_secs(5))
        .await;
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(h.api.lookups.load(Ordering::SeqCst), 0);

    // Nothing left to wait for.
    h.orchestrator
        .settle_confirmations(Duration::from_secs(5))
        .await;
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_non_working_day_skip_follows_option() {
    let saturday = date("2025-03-15");
    let sunday = date("2025-03-16");

    let h = harness(FakeApi::default());
    let summary = h
        .orchestrator
        .run(&[saturday, sunday], None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.successful, vec![saturday]);
    assert_eq!(summary.excluded, vec![sunday]);
    assert!(summary.already_booked.is_empty() && summary.failed.is_empty());
    // Short-day window starts at the same local hour.
    assert_eq!(h.api.started(), vec!["2025-03-15T03:30:00.000Z"]);

    let h = harness(FakeApi::default());
    let summary = h
        .orchestrator
        .run(&[saturday, sunday], Some(false), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.successful, vec![saturday, sunday]);
    assert!(summary.excluded.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_past_dates_are_excluded() {
    let h = harness(FakeApi::default());
    let summary = h
        .orchestrator
        .run(&[date("2025-03-07")], Some(false), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.excluded, vec![date("2025-03-07")]);
    assert!(h.api.started().is_empty());
}

#[tokio::test]
async fn test_missing_token_fails_before_any_call() {
    let h = harness_with(
        FakeApi::default(),
        false,
        DeskbookConfig::default().default_location(),
    );
    let result = h.orchestrator.run(&[date("2025-03-10")], None, None).await;

    assert_eq!(result, Err(AppError::AuthMissing));
    assert!(h.api.started().is_empty());
    assert!(!h.orchestrator.is_running());
}

#[tokio::test]
async fn test_location_without_space_id_is_rejected() {
    let mut location = DeskbookConfig::default().default_location();
    location.space_id.clear();
    let h = harness_with(FakeApi::default(), true, location);

    let result = h.orchestrator.run(&[date("2025-03-10")], None, None).await;
    assert!(matches!(
        result,
        Err(AppError::InvalidLocation {
            field: "space id",
            ..
        })
    ));
    assert!(h.api.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_every_classified_date() {
    let h = harness(FakeApi::rejecting(&[date("2025-03-12")]));
    let location = DeskbookConfig::default().default_location();
    h.ledger
        .record_successes(&[date("2025-03-10")], &location)
        .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    h.orchestrator
        .run(
            &[date("2025-03-10"), date("2025-03-11"), date("2025-03-12")],
            None,
            Some(tx),
        )
        .await
        .unwrap();

    let mut reports = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        reports.push(progress);
    }
    let outcomes: Vec<(usize, usize, BookingOutcome)> = reports
        .iter()
        .map(|p| (p.index, p.total, p.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (1, 3, BookingOutcome::SkippedAlreadyBooked),
            (2, 3, BookingOutcome::Success),
            (3, 3, BookingOutcome::Failed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_run_is_ignored() {
    let h = harness(FakeApi::default());
    let dates = [date("2025-03-10"), date("2025-03-11")];
    let other_dates = [date("2025-03-12")];

    let (first, second) = tokio::join!(
        h.orchestrator.run(&dates, None, None),
        h.orchestrator.run(&other_dates, None, None),
    );

    assert_eq!(first.unwrap().unwrap().success_count(), 2);
    assert_eq!(second, Ok(None));
    assert_eq!(h.api.started().len(), 2);
    assert!(!h.orchestrator.is_running());
}
