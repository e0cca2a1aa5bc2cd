use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use deskbook_core::time::format_date_short;
use deskbook_core::{BookingRecord, BookingSummary, DateSelection, RunStatus};
use deskbook_scheduler::{BookingProgress, ConsoleNotifier};
use serde_json::json;
use tokio::sync::mpsc;

use crate::app::{App, DeferredAlarms};
use crate::cli::OutputFormat;
use crate::remind_cmd::print_reminders;

/// How long a one-shot run waits for its remote confirmation checks.
const CONFIRMATION_GRACE: Duration = Duration::from_secs(5);

pub(crate) fn handle_bookings_list(app: &App, format: OutputFormat) -> Result<()> {
    let upcoming = app.ledger.upcoming();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&upcoming)?),
        OutputFormat::Text => {
            if upcoming.is_empty() {
                eprintln!("No upcoming bookings");
            }
            for record in &upcoming {
                println!("{}", booking_line(record));
            }
        }
    }
    Ok(())
}

pub(crate) async fn handle_bookings_sync(app: &App, format: OutputFormat) -> Result<()> {
    let added = app.sync_bookings().await;
    let total = app.ledger.upcoming().len();
    match format {
        OutputFormat::Json => println!("{}", json!({ "added": added, "upcoming": total })),
        OutputFormat::Text => println!("Added {added} booking(s); {total} upcoming"),
    }
    Ok(())
}

/// Run one booking pass. Returns the process exit code: non-zero when any
/// date failed.
pub(crate) async fn handle_book(
    app: &App,
    dates: Vec<String>,
    no_skip: bool,
    remind: Option<u32>,
    format: OutputFormat,
) -> Result<i32> {
    let selection = DateSelection::parse(dates.iter().map(String::as_str))?;
    let skip = no_skip.then_some(false);

    let (progress, mut progress_rx) = mpsc::unbounded_channel::<BookingProgress>();
    let printer = tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            eprintln!("{}", progress_line(&update));
        }
    });
    let result = app
        .orchestrator
        .run(&selection.sorted(), skip, Some(progress))
        .await;
    let _ = printer.await;

    let Some(summary) = result? else {
        anyhow::bail!("a booking run is already in progress");
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!("{}", render_summary(&summary)),
    }

    if let Some(lead_days) = remind {
        if summary.offers_reminders() {
            let notifier = ConsoleNotifier::new(app.config.reminders.notification_permission);
            let scheduler = app.reminders(Arc::new(DeferredAlarms), Arc::new(notifier));
            let reminders = scheduler.schedule(&summary.successful, lead_days).await?;
            print_reminders(&reminders, format)?;
        } else {
            eprintln!("Nothing was booked, no reminders scheduled");
        }
    }

    app.orchestrator
        .settle_confirmations(CONFIRMATION_GRACE)
        .await;

    Ok(match summary.status() {
        RunStatus::AllSucceeded => 0,
        RunStatus::AllFailed | RunStatus::Partial => 1,
    })
}

fn progress_line(update: &BookingProgress) -> String {
    format!(
        "Booking {} of {}: {} {}",
        update.index,
        update.total,
        format_date_short(update.date),
        update.outcome
    )
}

fn booking_line(record: &BookingRecord) -> String {
    let name = if record.location_name.is_empty() {
        record.location_id.as_str()
    } else {
        record.location_name.as_str()
    };
    format!("{}  {}", record.date, name)
}

fn render_summary(summary: &BookingSummary) -> String {
    let mut out = format!(
        "{} booked, {} failed, {} already booked\n",
        summary.success_count(),
        summary.failed_count(),
        summary.already_booked_count()
    );
    let sections = [
        ("booked", &summary.successful),
        ("failed", &summary.failed),
        ("already booked", &summary.already_booked),
        ("not attempted", &summary.excluded),
    ];
    for (label, dates) in sections {
        if dates.is_empty() {
            continue;
        }
        let listed: Vec<String> = dates.iter().map(|d| format_date_short(*d)).collect();
        out.push_str(&format!("  {label}: {}\n", listed.join("; ")));
    }
    out
}
