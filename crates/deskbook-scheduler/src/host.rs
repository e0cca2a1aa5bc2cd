use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskbook_config::NotificationPermission;
use deskbook_core::message::HostEvent;
use deskbook_core::{AppError, AppResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One-shot named alarms.
#[async_trait]
pub trait AlarmHost: Send + Sync {
    /// Arm an alarm for `fire_at`. Re-using a name replaces the earlier alarm.
    async fn create(&self, name: &str, fire_at: DateTime<Utc>) -> AppResult<()>;
}

/// User-facing notifications gated by a permission.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    /// Ask for permission. Returns the state after asking.
    async fn request_permission(&self) -> NotificationPermission;

    async fn notify(&self, title: &str, message: &str) -> AppResult<()>;
}

/// Alarms backed by tokio timers. Fired alarm names arrive on the receiver
/// returned from [`TokioAlarmHost::new`].
///
/// Alarms live only as long as the process. Persisted reminders are re-armed
/// on startup by [`crate::ReminderScheduler::restore`].
pub struct TokioAlarmHost {
    fired: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioAlarmHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let host = Self {
            fired,
            pending: Mutex::new(HashMap::new()),
        };
        (host, receiver)
    }
}

#[async_trait]
impl AlarmHost for TokioAlarmHost {
    async fn create(&self, name: &str, fire_at: DateTime<Utc>) -> AppResult<()> {
        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let fired = self.fired.clone();
        let alarm = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.send(alarm.clone()).is_err() {
                debug!(alarm = %alarm, "alarm fired after receiver closed");
            }
        });

        let mut table = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = table.insert(name.to_string(), handle) {
            previous.abort();
        }
        debug!(alarm = %name, fire_at = %fire_at, "alarm armed");
        Ok(())
    }
}

impl Drop for TokioAlarmHost {
    fn drop(&mut self) {
        let table = match self.pending.get_mut() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, handle) in table.drain() {
            handle.abort();
        }
    }
}

/// Permission state shared by the notifiers below. Asking from `Default`
/// grants; an explicit denial sticks.
#[derive(Debug)]
struct PermissionState(Mutex<NotificationPermission>);

impl PermissionState {
    fn current(&self) -> NotificationPermission {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn request(&self) -> NotificationPermission {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard == NotificationPermission::Default {
            *guard = NotificationPermission::Granted;
        }
        *guard
    }

    fn ensure_granted(&self) -> AppResult<()> {
        match self.current() {
            NotificationPermission::Granted => Ok(()),
            _ => Err(AppError::PermissionDenied),
        }
    }
}

/// Prints notifications to stderr.
#[derive(Debug)]
pub struct ConsoleNotifier {
    permission: PermissionState,
}

impl ConsoleNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission: PermissionState(Mutex::new(permission)),
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission.current()
    }

    async fn request_permission(&self) -> NotificationPermission {
        self.permission.request()
    }

    async fn notify(&self, title: &str, message: &str) -> AppResult<()> {
        self.permission.ensure_granted()?;
        eprintln!("[{title}] {message}");
        info!(title, "notification shown");
        Ok(())
    }
}

/// Forwards notifications to the browser side as [`HostEvent::Notification`].
#[derive(Debug)]
pub struct EventNotifier {
    permission: PermissionState,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl EventNotifier {
    pub fn new(permission: NotificationPermission, events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            permission: PermissionState(Mutex::new(permission)),
            events,
        }
    }
}

#[async_trait]
impl Notifier for EventNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission.current()
    }

    async fn request_permission(&self) -> NotificationPermission {
        self.permission.request()
    }

    async fn notify(&self, title: &str, message: &str) -> AppResult<()> {
        self.permission.ensure_granted()?;
        self.events
            .send(HostEvent::Notification {
                title: title.to_string(),
                message: message.to_string(),
            })
            .map_err(|_| AppError::Transport("host event channel closed".into()))
    }
}
