use std::sync::Arc;

use anyhow::Result;
use deskbook_core::time::format_date_short;
use deskbook_core::{DateSelection, Reminder};
use deskbook_scheduler::{ConsoleNotifier, TokioAlarmHost};
use tracing::{info, warn};

use crate::app::{App, DeferredAlarms};
use crate::cli::OutputFormat;

pub(crate) async fn handle_remind(
    app: &App,
    lead_days: u32,
    dates: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let selection = DateSelection::parse(dates.iter().map(String::as_str))?;
    let notifier = ConsoleNotifier::new(app.config.reminders.notification_permission);
    let scheduler = app.reminders(Arc::new(DeferredAlarms), Arc::new(notifier));
    let reminders = scheduler.schedule(&selection.sorted(), lead_days).await?;
    print_reminders(&reminders, format)?;
    if !reminders.is_empty() {
        eprintln!("Run `deskbook watch` to deliver them");
    }
    Ok(())
}

/// Arm every stored reminder and deliver them until interrupted.
pub(crate) async fn handle_watch(app: &App) -> Result<()> {
    let (alarms, mut fired) = TokioAlarmHost::new();
    let notifier = ConsoleNotifier::new(app.config.reminders.notification_permission);
    let scheduler = app.reminders(Arc::new(alarms), Arc::new(notifier));
    let armed = scheduler.restore().await?;
    info!(armed, "watching for reminders");
    eprintln!("Watching {armed} reminder(s); press Ctrl-C to stop");

    loop {
        tokio::select! {
            alarm = fired.recv() => {
                let Some(alarm) = alarm else { break };
                if let Err(error) = scheduler.handle_alarm(&alarm).await {
                    warn!(alarm = %alarm, %error, "could not deliver reminder");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

pub(crate) fn print_reminders(reminders: &[Reminder], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reminders)?),
        OutputFormat::Text => {
            if reminders.is_empty() {
                eprintln!("No reminders scheduled");
            }
            for reminder in reminders {
                println!("{}", reminder_line(reminder));
            }
        }
    }
    Ok(())
}

fn reminder_line(reminder: &Reminder) -> String {
    format!(
        "{}  fires {}  ({} day(s) ahead)",
        format_date_short(reminder.booking_date),
        reminder.fire_at.to_rfc3339(),
        reminder.lead_days
    )
}
