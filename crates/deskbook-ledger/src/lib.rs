//! Booking Ledger: the durable record of reserved dates and its
//! reconciliation against the platform's upcoming-bookings view.

pub mod ledger;
pub mod remote;

pub use ledger::BookingLedger;
pub use remote::record_from_remote;
