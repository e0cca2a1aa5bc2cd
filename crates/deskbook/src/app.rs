use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskbook_capture::TokenCapture;
use deskbook_client::{BookingApi, CatalogSource, HttpClient};
use deskbook_config::DeskbookConfig;
use deskbook_core::{AppResult, Clock, SystemClock};
use deskbook_ledger::BookingLedger;
use deskbook_locations::{BundledCatalog, LocationRegistry};
use deskbook_scheduler::{
    AlarmHost, BookingOrchestrator, Notifier, OrchestratorSettings, ReminderScheduler,
};
use deskbook_store::{CredentialStore, JsonFileStore, KvStore, StateStore};
use tracing::debug;

/// Every component, wired over one state store.
pub(crate) struct App {
    pub config: DeskbookConfig,
    pub state: StateStore,
    pub credentials: CredentialStore,
    pub capture: Arc<TokenCapture>,
    pub registry: Arc<LocationRegistry>,
    pub ledger: Arc<BookingLedger>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::from_config(load_config(config_path)?)
    }

    pub fn from_config(config: DeskbookConfig) -> Result<Self> {
        let state_file = config.state_file();
        debug!(path = %state_file.display(), "using state file");
        let http = Arc::new(HttpClient::new(&config.platform).context("http client")?);
        let clock = Arc::new(SystemClock::new(config.site.offset()?));
        Self::with_backends(
            config,
            Arc::new(JsonFileStore::new(state_file)),
            http.clone(),
            http,
            clock,
        )
    }

    pub fn with_backends(
        config: DeskbookConfig,
        kv: Arc<dyn KvStore>,
        api: Arc<dyn BookingApi>,
        live_catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let state = StateStore::new(kv);
        let credentials = CredentialStore::new(state.clone());
        let capture = Arc::new(TokenCapture::new(
            credentials.clone(),
            config.platform.capture_domain.clone(),
        ));
        let registry = Arc::new(LocationRegistry::new(
            state.clone(),
            Arc::new(BundledCatalog),
            live_catalog,
            config.default_location(),
            config.platform.default_city.clone(),
        ));
        let ledger = Arc::new(BookingLedger::new(
            state.clone(),
            credentials.clone(),
            api.clone(),
            clock.clone(),
        ));
        let orchestrator = Arc::new(BookingOrchestrator::new(
            credentials.clone(),
            registry.clone(),
            ledger.clone(),
            api,
            clock.clone(),
            OrchestratorSettings::from_config(&config)?,
        ));
        Ok(Self {
            config,
            state,
            credentials,
            capture,
            registry,
            ledger,
            orchestrator,
            clock,
        })
    }

    pub fn reminders(
        &self,
        alarms: Arc<dyn AlarmHost>,
        notifier: Arc<dyn Notifier>,
    ) -> ReminderScheduler {
        ReminderScheduler::new(
            self.state.clone(),
            self.ledger.clone(),
            self.registry.clone(),
            alarms,
            notifier,
            self.clock.clone(),
            self.config.reminders.hour,
        )
    }

    /// Reconcile the ledger against the active location. Returns how many
    /// bookings were added.
    pub async fn sync_bookings(&self) -> usize {
        let active = self.registry.active_location();
        self.ledger.reconcile(&active).await
    }
}

pub(crate) fn load_config(config_path: Option<&Path>) -> Result<DeskbookConfig> {
    match config_path {
        Some(path) => DeskbookConfig::load_from(path),
        None => DeskbookConfig::load(),
    }
}

/// Alarm host for one-shot CLI commands. Reminders are persisted by the
/// scheduler and armed later by `deskbook watch`.
#[derive(Debug, Default)]
pub(crate) struct DeferredAlarms;

#[async_trait]
impl AlarmHost for DeferredAlarms {
    async fn create(&self, name: &str, fire_at: DateTime<Utc>) -> AppResult<()> {
        debug!(alarm = %name, fire_at = %fire_at, "alarm deferred to `deskbook watch`");
        Ok(())
    }
}
