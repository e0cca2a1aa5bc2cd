//! Last-resort location discovery from an open page's markup.

use std::collections::HashSet;

use deskbook_core::Location;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

const CARD_SELECTOR: &str = "[data-location-id], [data-locationid], [data-space-id]";
const NAME_SELECTORS: [&str; 3] = [r#"[data-test="location-name"]"#, ".location-name", "h3, h4"];

/// Locations advertised by a page, deduplicated by (name, location, space).
///
/// Two shapes are recognised: `<select>` elements whose id mentions
/// "location" (each non-empty option is a location), and elements tagged
/// with location/space data attributes.
pub fn scrape_locations(html: &str) -> Vec<Location> {
    let document = Html::parse_document(html);
    let mut found = from_selects(&document);
    found.extend(from_cards(&document));

    let mut seen = HashSet::new();
    let deduped: Vec<Location> = found
        .into_iter()
        .filter(|location| seen.insert(location.dedup_key()))
        .collect();
    debug!(count = deduped.len(), "scraped locations from page");
    deduped
}

fn parse_selector(raw: &str) -> Option<Selector> {
    Selector::parse(raw).ok()
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn from_selects(document: &Html) -> Vec<Location> {
    let (Some(selects), Some(options)) = (parse_selector("select"), parse_selector("option"))
    else {
        return Vec::new();
    };

    document
        .select(&selects)
        .filter(|select| {
            select
                .value()
                .id()
                .is_some_and(|id| id.to_lowercase().contains("location"))
        })
        .flat_map(|select| select.select(&options).collect::<Vec<_>>())
        .filter_map(|option| {
            let value = option.value().attr("value")?.trim();
            if value.is_empty() {
                return None;
            }
            Some(Location {
                name: text_of(option),
                location_id: value.to_string(),
                ..Location::default()
            })
        })
        .collect()
}

fn from_cards(document: &Html) -> Vec<Location> {
    let Some(cards) = parse_selector(CARD_SELECTOR) else {
        return Vec::new();
    };
    let name_selectors: Vec<Selector> = NAME_SELECTORS
        .iter()
        .filter_map(|raw| parse_selector(raw))
        .collect();

    document
        .select(&cards)
        .filter_map(|card| {
            let element = card.value();
            let name = name_selectors
                .iter()
                .find_map(|selector| card.select(selector).next())
                .map(text_of)
                .unwrap_or_else(|| element.attr("data-name").unwrap_or("").trim().to_string());
            if name.is_empty() {
                return None;
            }
            let attr = |key: &str| element.attr(key).unwrap_or("").trim().to_string();
            let optional = |key: &str| Some(attr(key)).filter(|value| !value.is_empty());
            let location_id = Some(attr("data-location-id"))
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| attr("data-locationid"));

            Some(Location {
                name,
                location_id,
                space_id: attr("data-space-id"),
                city: optional("data-city"),
                country: optional("data-country"),
                ..Location::default()
            })
        })
        .collect()
}

/// Fields of a Next.js page's `__NEXT_DATA__` blob that the catalog lookup
/// can use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextData {
    pub build_id: Option<String>,
    pub city: Option<String>,
}

pub fn parse_next_data(html: &str) -> Option<NextData> {
    let document = Html::parse_document(html);
    let selector = parse_selector(r#"script[id="__NEXT_DATA__"]"#)?;
    let script = document.select(&selector).next()?;
    let raw: String = script.text().collect();
    let json: Value = serde_json::from_str(raw.trim()).ok()?;

    let string_at = |pointer: &str| {
        json.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    Some(NextData {
        build_id: string_at("/buildId"),
        city: string_at("/query/city"),
    })
}
