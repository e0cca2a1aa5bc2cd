use async_trait::async_trait;
use deskbook_core::{AppError, AppResult};
use serde::Deserialize;
use url::Url;

/// Source of raw building entries for a city.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// `build_id` overrides the configured catalog build when a page
    /// advertised a fresher one.
    async fn fetch_buildings(
        &self,
        city_slug: &str,
        build_id: Option<&str>,
    ) -> AppResult<Vec<Building>>;
}

/// One building from `pageProps.locationsData.buildingsData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location_uuid: Option<String>,
    #[serde(default)]
    pub address: Option<BuildingAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingAddress {
    #[serde(default)]
    pub building_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_code: Option<String>,
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogResponse {
    #[serde(default)]
    page_props: Option<PageProps>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    #[serde(default)]
    locations_data: Option<LocationsData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationsData {
    #[serde(default)]
    buildings_data: Option<Vec<Building>>,
}

/// Extract the building list from a catalog document. A document without
/// the nested list yields no buildings.
pub fn parse_catalog(body: &str) -> AppResult<Vec<Building>> {
    let response: CatalogResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Transport(format!("invalid catalog document: {e}")))?;
    Ok(response
        .page_props
        .and_then(|props| props.locations_data)
        .and_then(|data| data.buildings_data)
        .unwrap_or_default())
}

/// `{base}/_next/data/{build_id}/coworking-space/{slug}.json?city={slug}`
pub fn catalog_url(base: &str, build_id: &str, city_slug: &str) -> AppResult<Url> {
    let raw = format!(
        "{}/_next/data/{}/coworking-space/{}.json",
        base.trim_end_matches('/'),
        build_id,
        city_slug
    );
    let mut url = Url::parse(&raw).map_err(|_| AppError::InvalidValue {
        what: "catalog url",
        value: raw.clone(),
    })?;
    url.query_pairs_mut().append_pair("city", city_slug);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_url() {
        let url = catalog_url("https://wework.co.in/", "TulhsZ6t_Z7i3brfoKhP8", "bangalore").unwrap();
        assert_eq!(
            url.as_str(),
            "https://wework.co.in/_next/data/TulhsZ6t_Z7i3brfoKhP8/coworking-space/bangalore.json?city=bangalore"
        );
    }

    #[test]
    fn test_parse_catalog_buildings() {
        let body = r#"{
            "pageProps": {
                "locationsData": {
                    "buildingsData": [
                        {
                            "_id": "b1",
                            "name": "Fallback Name",
                            "locationUuid": "loc-1",
                            "address": {"buildingName": "Embassy Golf Links", "city": " Bengaluru ", "line1": "Block C"}
                        },
                        {"_id": "b2", "name": "Galaxy"}
                    ]
                }
            }
        }"#;
        let buildings = parse_catalog(body).unwrap();
        assert_eq!(buildings.len(), 2);
        assert_eq!(buildings[0].location_uuid.as_deref(), Some("loc-1"));
        assert_eq!(
            buildings[0]
                .address
                .as_ref()
                .and_then(|a| a.building_name.as_deref()),
            Some("Embassy Golf Links")
        );
        assert_eq!(buildings[1].address, None);
    }

    #[test]
    fn test_parse_catalog_without_buildings() {
        assert!(parse_catalog(r#"{"pageProps": {}}"#).unwrap().is_empty());
        assert!(parse_catalog("{}").unwrap().is_empty());
        assert!(parse_catalog("not json").is_err());
    }
}
