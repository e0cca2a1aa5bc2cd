//! Shared data model, host message types, and error taxonomy for deskbook.

pub mod error;
pub mod message;
pub mod time;
pub mod types;

pub use error::{AppError, AppResult};
pub use time::{Clock, FixedClock, SystemClock};
pub use types::{
    BookingKey, BookingOutcome, BookingRecord, BookingSummary, Credential, DateSelection,
    Location, MailAddress, Reminder, RunStatus,
};
