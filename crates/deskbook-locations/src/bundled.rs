use async_trait::async_trait;
use deskbook_client::{Building, CatalogSource, parse_catalog};
use deskbook_core::AppResult;

const BANGALORE: &str = include_str!("../data/bangalore.json");

/// Catalog snapshot compiled into the binary. Only the home city is covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCatalog;

#[async_trait]
impl CatalogSource for BundledCatalog {
    async fn fetch_buildings(
        &self,
        city_slug: &str,
        _build_id: Option<&str>,
    ) -> AppResult<Vec<Building>> {
        if city_slug.eq_ignore_ascii_case("bangalore") {
            parse_catalog(BANGALORE)
        } else {
            Ok(Vec::new())
        }
    }
}
