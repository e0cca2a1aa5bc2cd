use std::path::Path;

use anyhow::{Context, Result};
use deskbook_core::Location;
use deskbook_locations::LocationQuery;

use crate::app::App;
use crate::cli::OutputFormat;

fn read_page(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|path| {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page markup: {}", path.display()))
    })
    .transpose()
}

pub(crate) async fn handle_locations_list(
    app: &App,
    city: Option<String>,
    search: Option<String>,
    page_html: Option<&Path>,
    page_url: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let query = LocationQuery {
        city,
        page_url,
        page_html: read_page(page_html)?,
    };
    let mut locations = app.registry.available_locations(&query).await;
    if let Some(search) = search.as_deref() {
        locations = app.registry.search(search);
    }
    let active = app.registry.active_location();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&locations)?),
        OutputFormat::Text => {
            if locations.is_empty() {
                eprintln!("No locations found");
            } else {
                print!("{}", render_locations(&locations, &active));
            }
        }
    }
    Ok(())
}

pub(crate) async fn handle_locations_select(
    app: &App,
    location_id: String,
    city: Option<String>,
    page_html: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let query = LocationQuery {
        city,
        page_url: None,
        page_html: read_page(page_html)?,
    };
    app.registry.available_locations(&query).await;
    let selected = app.registry.select_by_id(&location_id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
        OutputFormat::Text => println!("Active location: {}", selected.name),
    }
    Ok(())
}

/// One line per location; the active one is starred.
fn render_locations(locations: &[Location], active: &Location) -> String {
    let width = locations
        .iter()
        .map(|location| location.name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for location in locations {
        let marker = if location.location_id == active.location_id
            && location.space_id == active.space_id
        {
            '*'
        } else {
            ' '
        };
        let city = location.city.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{marker} {:<width$}  {:<12}  {}\n",
            location.name, city, location.location_id
        ));
    }
    out
}
