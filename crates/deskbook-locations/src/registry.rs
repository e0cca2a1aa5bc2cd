use std::sync::{Arc, RwLock};

use deskbook_capture::{NextData, parse_next_data, scrape_locations};
use deskbook_client::{Building, CatalogSource};
use deskbook_core::{AppError, AppResult, Location};
use deskbook_store::StateStore;
use tracing::{debug, info, warn};

use crate::normalize::{city_from_page_url, normalize_building};

/// Inputs to a location lookup. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct LocationQuery {
    pub city: Option<String>,
    pub page_url: Option<String>,
    pub page_html: Option<String>,
}

/// Resolves bookable locations and owns the active selection.
///
/// Lookup order is bundled snapshot, then the live catalog, then whatever
/// the supplied page markup advertises. The last successful list is cached
/// for [`LocationRegistry::search`] and selection by id.
pub struct LocationRegistry {
    state: StateStore,
    bundled: Arc<dyn CatalogSource>,
    live: Arc<dyn CatalogSource>,
    default_location: Location,
    default_city: String,
    candidates: RwLock<Vec<Location>>,
}

impl LocationRegistry {
    pub fn new(
        state: StateStore,
        bundled: Arc<dyn CatalogSource>,
        live: Arc<dyn CatalogSource>,
        default_location: Location,
        default_city: impl Into<String>,
    ) -> Self {
        Self {
            state,
            bundled,
            live,
            default_location,
            default_city: default_city.into(),
            candidates: RwLock::new(Vec::new()),
        }
    }

    pub fn default_location(&self) -> &Location {
        &self.default_location
    }

    /// City slug for a lookup: explicit, then page URL, then the page's
    /// embedded route data, then the configured default.
    pub fn resolve_city(&self, query: &LocationQuery, next_data: Option<&NextData>) -> String {
        query
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .map(str::to_string)
            .or_else(|| query.page_url.as_deref().and_then(city_from_page_url))
            .or_else(|| next_data.and_then(|data| data.city.clone()))
            .unwrap_or_else(|| self.default_city.clone())
            .to_lowercase()
    }

    pub async fn available_locations(&self, query: &LocationQuery) -> Vec<Location> {
        let next_data = query.page_html.as_deref().and_then(parse_next_data);
        let city = self.resolve_city(query, next_data.as_ref());
        let build_id = next_data.as_ref().and_then(|data| data.build_id.as_deref());

        let mut buildings = self.fetch("bundled", self.bundled.as_ref(), &city, None).await;
        if buildings.is_empty() {
            buildings = self
                .fetch("live", self.live.as_ref(), &city, build_id)
                .await;
        }

        let locations: Vec<Location> = if buildings.is_empty() {
            let scraped = query
                .page_html
                .as_deref()
                .map(scrape_locations)
                .unwrap_or_default();
            debug!(city = %city, count = scraped.len(), "falling back to page scrape");
            scraped
        } else {
            buildings.iter().map(normalize_building).collect()
        };

        info!(city = %city, count = locations.len(), "resolved locations");
        if !locations.is_empty() {
            self.replace_candidates(locations.clone());
        }
        locations
    }

    async fn fetch(
        &self,
        source: &'static str,
        catalog: &dyn CatalogSource,
        city: &str,
        build_id: Option<&str>,
    ) -> Vec<Building> {
        match catalog.fetch_buildings(city, build_id).await {
            Ok(buildings) => {
                debug!(source, city, count = buildings.len(), "catalog lookup");
                buildings
            }
            Err(error) => {
                warn!(source, city, %error, "catalog lookup failed");
                Vec::new()
            }
        }
    }

    fn replace_candidates(&self, locations: Vec<Location>) {
        match self.candidates.write() {
            Ok(mut guard) => *guard = locations,
            Err(poisoned) => *poisoned.into_inner() = locations,
        }
    }

    /// Cached candidates from the last lookup.
    pub fn candidates(&self) -> Vec<Location> {
        match self.candidates.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Case-insensitive name/city filter over the cached candidates.
    pub fn search(&self, query: &str) -> Vec<Location> {
        self.candidates()
            .into_iter()
            .filter(|location| location.matches_query(query))
            .collect()
    }

    /// Make `location` active. Empty fields are filled from the default, so
    /// the stored selection always carries booking ids.
    pub fn select(&self, location: &Location) -> AppResult<Location> {
        let merged = location.merged_over(&self.default_location);
        ensure_bookable(&merged)?;
        self.state
            .set_selected_location(&merged)
            .map_err(|e| AppError::Storage(format!("{e:#}")))?;
        info!(
            name = %merged.name,
            location_id = %merged.location_id,
            "selected location"
        );
        Ok(merged)
    }

    /// Select a cached candidate by its location id.
    pub fn select_by_id(&self, location_id: &str) -> AppResult<Location> {
        let candidate = self
            .candidates()
            .into_iter()
            .find(|location| location.location_id == location_id)
            .ok_or_else(|| AppError::InvalidValue {
                what: "location id",
                value: location_id.to_string(),
            })?;
        self.select(&candidate)
    }

    /// The persisted selection over the default, or the default itself.
    pub fn active_location(&self) -> Location {
        match self.state.selected_location() {
            Ok(Some(selected)) => selected.merged_over(&self.default_location),
            Ok(None) => self.default_location.clone(),
            Err(error) => {
                warn!(error = %format!("{error:#}"), "could not read selected location");
                self.default_location.clone()
            }
        }
    }
}

/// Booking calls need both ids.
pub fn ensure_bookable(location: &Location) -> AppResult<()> {
    let missing = if location.location_id.trim().is_empty() {
        Some("location id")
    } else if location.space_id.trim().is_empty() {
        Some("space id")
    } else {
        None
    };
    match missing {
        Some(field) => Err(AppError::InvalidLocation {
            name: location.name.clone(),
            field,
        }),
        None => Ok(()),
    }
}

impl std::fmt::Debug for LocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationRegistry")
            .field("default_location", &self.default_location.name)
            .field("default_city", &self.default_city)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
