use std::collections::BTreeMap;

use anyhow::{Result, bail};
use deskbook_core::message::HeaderEntry;
use serde_json::json;

use crate::app::App;
use crate::cli::OutputFormat;

const MASK_KEEP: usize = 8;

pub(crate) fn handle_token_show(app: &App, reveal: bool, format: OutputFormat) -> Result<()> {
    let credential = app.credentials.get()?;
    match format {
        OutputFormat::Json => {
            let value = match &credential {
                Some(credential) => json!({
                    "token": if reveal { credential.token.clone() } else { mask(&credential.token) },
                    "headers": credential.auxiliary_headers,
                    "capturedAt": credential.captured_at,
                }),
                None => json!({ "token": null }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => match credential {
            Some(credential) => {
                let shown = if reveal {
                    credential.token.clone()
                } else {
                    mask(&credential.token)
                };
                println!("token:       {shown}");
                println!("captured at: {}", credential.captured_at.to_rfc3339());
                println!("headers:     {}", credential.auxiliary_headers.len());
            }
            None => println!("Not authenticated: no bearer token captured yet"),
        },
    }
    Ok(())
}

pub(crate) fn handle_token_set(app: &App, token: String, headers: Vec<String>) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("token must not be empty");
    }
    let headers = headers
        .iter()
        .map(|raw| parse_header(raw).map(|entry| (entry.name.to_lowercase(), entry.value)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    app.capture.set_token(token, headers)?;
    eprintln!("Stored bearer token ({} chars)", token.len());
    Ok(())
}

pub(crate) fn handle_token_clear(app: &App) -> Result<()> {
    app.credentials.clear()?;
    eprintln!("Cleared stored token");
    Ok(())
}

/// Returns whether a token was captured.
pub(crate) async fn handle_capture_header(
    app: &App,
    url: String,
    headers: Vec<String>,
    format: OutputFormat,
) -> Result<bool> {
    let entries = headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<Vec<_>>>()?;
    let captured = app.capture.observe_request(&url, &entries);
    if captured {
        let added = app.sync_bookings().await;
        tracing::debug!(added, "reconciled after capture");
    }
    match format {
        OutputFormat::Json => println!("{}", json!({ "captured": captured })),
        OutputFormat::Text if captured => println!("Captured bearer token from {url}"),
        OutputFormat::Text => println!("No bearer token captured"),
    }
    Ok(captured)
}

/// `Name: value` as typed on the command line.
fn parse_header(raw: &str) -> Result<HeaderEntry> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("expected `name: value`, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header name is empty in '{raw}'");
    }
    Ok(HeaderEntry {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

fn mask(token: &str) -> String {
    if token.chars().count() <= MASK_KEEP {
        return "*".repeat(token.chars().count());
    }
    let head: String = token.chars().take(MASK_KEEP).collect();
    format!("{head}… ({} chars)", token.chars().count())
}
