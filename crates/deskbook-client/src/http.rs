use async_trait::async_trait;
use deskbook_config::PlatformConfig;
use deskbook_core::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::api::{BookingApi, RemoteBooking, parse_upcoming_bookings};
use crate::booking::BookingRequest;
use crate::catalog::{Building, CatalogSource, catalog_url, parse_catalog};

const BOOKING_PATH: &str = "/workplaceone/api/common-booking/";
const UPCOMING_PATH: &str = "/workplaceone/api/common-booking/upcoming-bookings";

/// `reqwest`-backed implementation of both remote contracts.
///
/// API calls carry the member web app's header set; catalog reads are plain
/// unauthenticated GETs.
#[derive(Debug, Clone)]
pub struct HttpClient {
    api_base: String,
    catalog_base: String,
    build_id: String,
    api: reqwest::Client,
    catalog: reqwest::Client,
}

impl HttpClient {
    pub fn new(platform: &PlatformConfig) -> AppResult<Self> {
        Self::with_client_builder(platform, reqwest::Client::builder)
    }

    /// Build both underlying clients from `builder`, e.g. to adjust proxy
    /// or TLS settings.
    pub fn with_client_builder(
        platform: &PlatformConfig,
        builder: impl Fn() -> reqwest::ClientBuilder,
    ) -> AppResult<Self> {
        let api = builder()
            .default_headers(header_map(&platform.default_headers())?)
            .build()
            .map_err(|e| AppError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            api_base: platform.api_base.trim_end_matches('/').to_string(),
            catalog_base: platform.catalog_base.trim_end_matches('/').to_string(),
            build_id: platform.build_id.clone(),
            api,
            catalog: builder()
                .build()
                .map_err(|e| AppError::Transport(format!("failed to build http client: {e}")))?,
        })
    }
}

fn header_map(headers: &[(String, String)]) -> AppResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| AppError::InvalidValue {
                what: "header name",
                value: name.clone(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| AppError::InvalidValue {
            what: "header value",
            value: value.clone(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn transport(error: reqwest::Error) -> AppError {
    AppError::Transport(error.to_string())
}

#[async_trait]
impl BookingApi for HttpClient {
    async fn create_booking(&self, token: &str, request: &BookingRequest) -> AppResult<()> {
        let url = format!("{}{}", self.api_base, BOOKING_PATH);
        let response = self
            .api
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, start = %request.start_time, "booking accepted");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(
            %status,
            start = %request.start_time,
            body = %truncate(&body, 200),
            "booking request rejected"
        );
        Err(AppError::RemoteRejected {
            status: status.as_u16(),
        })
    }

    async fn upcoming_bookings(&self, token: &str) -> AppResult<Vec<RemoteBooking>> {
        let url = format!("{}{}", self.api_base, UPCOMING_PATH);
        let response = self
            .api
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Reconciliation(format!(
                "upcoming bookings returned HTTP {status}"
            )));
        }
        let body = response.text().await.map_err(transport)?;
        parse_upcoming_bookings(&body)
    }
}

#[async_trait]
impl CatalogSource for HttpClient {
    async fn fetch_buildings(
        &self,
        city_slug: &str,
        build_id: Option<&str>,
    ) -> AppResult<Vec<Building>> {
        let build_id = build_id.unwrap_or(&self.build_id);
        let url = catalog_url(&self.catalog_base, build_id, city_slug)?;
        let response = self
            .catalog
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RemoteRejected {
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(transport)?;
        let buildings = parse_catalog(&body)?;
        debug!(%url, count = buildings.len(), "fetched live catalog");
        Ok(buildings)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
