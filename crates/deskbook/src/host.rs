//! `deskbook host`: the native-messaging endpoint the browser extension
//! talks to.
//!
//! Each inbound frame is one [`HostRequest`] and gets exactly one response
//! frame, tagged with the request's `requestId` when it carried one.
//! Requests run concurrently, so a long booking run does not block token
//! capture. Unsolicited [`HostEvent`] frames (captured tokens, booking
//! progress, notifications) are interleaved on the same stream.

use std::sync::Arc;

use anyhow::Result;
use deskbook_core::AppError;
use deskbook_core::message::{HostEvent, HostRequest, HostResponse};
use deskbook_locations::LocationQuery;
use deskbook_scheduler::{EventNotifier, ReminderScheduler, TokioAlarmHost};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::frame::{read_frame, write_frame};

const REQUEST_ID: &str = "requestId";

const KNOWN_ACTIONS: &[&str] = &[
    "setToken",
    "getToken",
    "tokenFromPage",
    "observeRequest",
    "inspectPageStorage",
    "getAvailableLocations",
    "selectLocation",
    "getBookedDates",
    "bookDates",
    "setReminders",
];

struct HostContext {
    app: Arc<App>,
    reminders: Arc<ReminderScheduler>,
    outbound: mpsc::UnboundedSender<Value>,
}

/// Serve requests from `reader` until it reaches end of stream.
pub(crate) async fn serve<R, W>(app: Arc<App>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, outbound_rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_loop(writer, outbound_rx));

    let (events, events_rx) = mpsc::unbounded_channel::<HostEvent>();
    let (alarms, fired) = TokioAlarmHost::new();
    let notifier = EventNotifier::new(app.config.reminders.notification_permission, events.clone());
    let reminders = Arc::new(app.reminders(Arc::new(alarms), Arc::new(notifier)));
    match reminders.restore().await {
        Ok(count) if count > 0 => info!(count, "restored reminder alarms"),
        Ok(_) => {}
        Err(error) => warn!(%error, "could not restore reminders"),
    }

    let background: Vec<JoinHandle<()>> = vec![
        tokio::spawn(forward_events(events_rx, outbound.clone())),
        tokio::spawn(on_token_captured(app.clone(), app.capture.subscribe(), events.clone())),
        tokio::spawn(deliver_reminders(reminders.clone(), fired)),
    ];
    drop(events);

    let context = Arc::new(HostContext {
        app,
        reminders,
        outbound: outbound.clone(),
    });
    drop(outbound);

    let mut reader = reader;
    let mut inflight = JoinSet::new();
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("input closed");
                break;
            }
            Err(error) => {
                error!(error = %format!("{error:#}"), "unreadable frame, stopping");
                break;
            }
        };
        let message: Value = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "skipping malformed frame");
                continue;
            }
        };
        let context = context.clone();
        inflight.spawn(async move {
            let reply = context.respond(message).await;
            if context.outbound.send(reply).is_err() {
                debug!("output closed before response was written");
            }
        });
    }

    while inflight.join_next().await.is_some() {}
    for task in background {
        task.abort();
        let _ = task.await;
    }
    drop(context);
    if let Err(error) = writer_task.await {
        warn!(%error, "frame writer stopped abnormally");
    }
    Ok(())
}

async fn write_loop<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if let Err(error) = write_frame(&mut writer, &frame).await {
            error!(error = %format!("{error:#}"), "failed to write frame");
            if frame.get("error").is_none() {
                // Likely oversized; the caller still needs an answer.
                let mut fallback = json!({ "error": "response too large" });
                if let Some(id) = frame.get(REQUEST_ID) {
                    fallback[REQUEST_ID] = id.clone();
                }
                if write_frame(&mut writer, &fallback).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn forward_events(
    mut events: mpsc::UnboundedReceiver<HostEvent>,
    outbound: mpsc::UnboundedSender<Value>,
) {
    while let Some(event) = events.recv().await {
        match serde_json::to_value(&event) {
            Ok(frame) => {
                if outbound.send(frame).is_err() {
                    break;
                }
            }
            Err(error) => warn!(%error, "failed to encode host event"),
        }
    }
}

async fn on_token_captured(
    app: Arc<App>,
    mut captured: broadcast::Receiver<HostEvent>,
    events: mpsc::UnboundedSender<HostEvent>,
) {
    loop {
        match captured.recv().await {
            Ok(event) => {
                if events.send(event).is_err() {
                    break;
                }
                let added = app.sync_bookings().await;
                debug!(added, "reconciled after token capture");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed token capture events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn deliver_reminders(
    reminders: Arc<ReminderScheduler>,
    mut fired: mpsc::UnboundedReceiver<String>,
) {
    while let Some(alarm) = fired.recv().await {
        if let Err(error) = reminders.handle_alarm(&alarm).await {
            warn!(alarm = %alarm, %error, "could not deliver reminder");
        }
    }
}

impl HostContext {
    async fn respond(&self, message: Value) -> Value {
        let request_id = message.get(REQUEST_ID).cloned();
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);

        let response = match serde_json::from_value::<HostRequest>(message) {
            Ok(request) => self.dispatch(request).await,
            Err(error) => match action.as_deref() {
                Some(action) if KNOWN_ACTIONS.contains(&action) => {
                    warn!(action, %error, "invalid request payload");
                    HostResponse::error(AppError::InvalidMessage(error.to_string()))
                }
                _ => {
                    debug!(action = ?action, "unknown action");
                    HostResponse::error("unknown action")
                }
            },
        };

        let mut reply = serde_json::to_value(&response)
            .unwrap_or_else(|error| json!({ "error": format!("failed to encode response: {error}") }));
        if let (Some(id), Some(fields)) = (request_id, reply.as_object_mut()) {
            fields.insert(REQUEST_ID.to_string(), id);
        }
        reply
    }

    async fn dispatch(&self, request: HostRequest) -> HostResponse {
        let app = &self.app;
        match request {
            HostRequest::SetToken { token, headers } => {
                match app.capture.set_token(&token, headers) {
                    Ok(()) => HostResponse::ok(),
                    Err(error) => HostResponse::error(format!("{error:#}")),
                }
            }
            HostRequest::GetToken => match app.credentials.get() {
                Ok(credential) => HostResponse::Token {
                    token: credential.as_ref().map(|c| c.token.clone()),
                    headers: credential.map(|c| c.auxiliary_headers),
                },
                Err(error) => HostResponse::error(format!("{error:#}")),
            },
            HostRequest::TokenFromPage { token } => HostResponse::Captured {
                captured: app.capture.token_from_page(&token),
            },
            HostRequest::ObserveRequest {
                url,
                request_headers,
            } => HostResponse::Captured {
                captured: app.capture.observe_request(&url, &request_headers),
            },
            HostRequest::InspectPageStorage { url, entries } => HostResponse::Captured {
                captured: app.capture.inspect_page_storage(&url, &entries),
            },
            HostRequest::GetAvailableLocations {
                city,
                page_url,
                page_html,
            } => {
                let query = LocationQuery {
                    city,
                    page_url,
                    page_html,
                };
                HostResponse::Locations {
                    locations: app.registry.available_locations(&query).await,
                }
            }
            HostRequest::SelectLocation { location } => match app.registry.select(&location) {
                Ok(_) => HostResponse::ok(),
                Err(error) => HostResponse::error(error),
            },
            HostRequest::GetBookedDates => {
                app.sync_bookings().await;
                HostResponse::BookedDates {
                    dates: app.ledger.booked_dates().into_iter().collect(),
                }
            }
            HostRequest::BookDates {
                dates,
                skip_non_working_day,
            } => self.book(dates, skip_non_working_day).await,
            HostRequest::SetReminders { dates, lead_days } => {
                match self.reminders.schedule(&dates, lead_days).await {
                    Ok(reminders) => HostResponse::Reminders { reminders },
                    Err(error) => HostResponse::error(error),
                }
            }
        }
    }

    async fn book(
        &self,
        dates: Vec<chrono::NaiveDate>,
        skip_non_working_day: Option<bool>,
    ) -> HostResponse {
        let (progress, mut progress_rx) = mpsc::unbounded_channel();
        let outbound = self.outbound.clone();
        // Progress frames are flushed before the response below.
        let relay = tokio::spawn(async move {
            while let Some(update) = progress_rx.recv().await {
                match serde_json::to_value(HostEvent::from(update)) {
                    Ok(frame) => {
                        let _ = outbound.send(frame);
                    }
                    Err(error) => warn!(%error, "failed to encode progress"),
                }
            }
        });

        let result = self
            .app
            .orchestrator
            .run(&dates, skip_non_working_day, Some(progress))
            .await;
        if let Err(error) = relay.await {
            warn!(%error, "progress relay stopped abnormally");
        }

        match result {
            Ok(Some(summary)) => HostResponse::Booking { summary },
            Ok(None) => HostResponse::error("a booking run is already in progress"),
            Err(error) => HostResponse::error(error),
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
