//! Passive bearer-token capture and the page-scrape location adapter.
//!
//! Nothing here ever logs in: tokens are only picked up from traffic and
//! storage the user's own browser session already produced.

pub mod capture;
pub mod dom;
pub mod header;
pub mod page;

pub use capture::TokenCapture;
pub use dom::{NextData, parse_next_data, scrape_locations};
pub use header::{extract_bearer, is_capture_url};
pub use page::token_from_storage;
