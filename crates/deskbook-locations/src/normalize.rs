use deskbook_client::Building;
use deskbook_core::{Location, MailAddress};
use url::Url;

const HOME_COUNTRY: &str = "India";
const HOME_MAIL_CITY: &str = "Bengaluru";
const HOME_MAIL_COUNTRY: &str = "IND";
const HOME_MAIL_STATE: &str = "KA";

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Turn a raw catalog building into a [`Location`]. Missing address parts
/// fall back to the home region.
///
/// The catalog carries no space id; selection fills it from the default.
pub fn normalize_building(building: &Building) -> Location {
    let address = building.address.clone().unwrap_or_default();
    let name = present(address.building_name.as_ref())
        .or_else(|| present(building.name.as_ref()))
        .unwrap_or_default()
        .to_string();
    let location_id = present(building.location_uuid.as_ref())
        .or_else(|| present(building.id.as_ref()))
        .unwrap_or_default()
        .to_string();
    let city = present(address.city.as_ref()).map(str::to_string);

    let street: Vec<&str> = [address.line1.as_ref(), address.line2.as_ref()]
        .into_iter()
        .filter_map(present)
        .collect();
    let location_address = if street.is_empty() {
        name.clone()
    } else {
        street.join(", ")
    };

    Location {
        mail_data: MailAddress {
            location_address,
            location_name: name.clone(),
            location_city: city.clone().unwrap_or_else(|| HOME_MAIL_CITY.to_string()),
            location_country: HOME_MAIL_COUNTRY.to_string(),
            location_state: present(address.state_code.as_ref())
                .unwrap_or(HOME_MAIL_STATE)
                .to_string(),
        },
        name,
        location_id,
        city,
        country: Some(HOME_COUNTRY.to_string()),
        ..Location::default()
    }
}

/// City slug from a `/coworking-space/<slug>` page URL.
pub fn city_from_page_url(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let mut segments = url.path_segments()?;
    segments
        .by_ref()
        .find(|segment| segment.eq_ignore_ascii_case("coworking-space"))?;
    segments
        .next()
        .map(|slug| slug.trim_end_matches(".json"))
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}
