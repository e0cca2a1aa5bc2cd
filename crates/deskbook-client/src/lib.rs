//! Remote contract of the member platform: booking creation, the
//! upcoming-bookings query and the public per-city location catalog.

pub mod api;
pub mod booking;
pub mod catalog;
pub mod http;

pub use api::{BookingApi, RemoteBooking, parse_upcoming_bookings};
pub use booking::{BookingRequest, BookingWindow, MailData, ReservationHours, SiteTimezone};
pub use catalog::{Building, BuildingAddress, CatalogSource, catalog_url, parse_catalog};
pub use http::HttpClient;
