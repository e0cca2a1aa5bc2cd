//! Location Registry: where bookable locations come from and which one is
//! active.

pub mod bundled;
pub mod normalize;
pub mod registry;

pub use bundled::BundledCatalog;
pub use normalize::{city_from_page_url, normalize_building};
pub use registry::{LocationQuery, LocationRegistry, ensure_bookable};
