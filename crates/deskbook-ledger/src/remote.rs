use chrono::FixedOffset;
use deskbook_client::RemoteBooking;
use deskbook_core::{BookingRecord, Location};

/// Normalize a remote entry. Entries without a parseable start are dropped.
///
/// Identifiers the platform omits are left empty except the provider space
/// id and name, which come from `active`.
pub fn record_from_remote(
    remote: &RemoteBooking,
    active: &Location,
    offset: FixedOffset,
) -> Option<BookingRecord> {
    let date = remote.start_date(offset)?;
    Some(BookingRecord {
        date,
        location_id: remote.location_id().unwrap_or_default().to_string(),
        space_id: remote.space_id().unwrap_or_default().to_string(),
        provider_space_id: active.provider_space_id.clone(),
        location_name: remote
            .location_name()
            .map(str::to_string)
            .unwrap_or_else(|| active.name.clone()),
        remote_uuid: remote.remote_uuid().map(str::to_string),
    })
}
