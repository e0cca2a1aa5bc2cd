use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use deskbook_core::{BookingRecord, Location, Reminder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::kv::KvStore;

/// Storage keys shared with the browser side.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const HEADERS: &str = "headers";
    pub const TOKEN_CAPTURED_AT: &str = "tokenCapturedAt";
    pub const SELECTED_LOCATION: &str = "selectedLocation";
    pub const BOOKINGS: &str = "bookings";
    pub const REMINDERS: &str = "reminders";
}

/// Typed view over a [`KvStore`].
#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KvStore>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Read and decode `key`. A value that no longer decodes is logged and
    /// reported as absent rather than failing the caller.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.kv.get(key)? else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(error) => {
                warn!(key, %error, "ignoring undecodable stored value");
                Ok(None)
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value =
            serde_json::to_value(value).with_context(|| format!("failed to encode '{key}'"))?;
        self.kv.set(key, value)
    }

    pub fn selected_location(&self) -> Result<Option<Location>> {
        self.get(keys::SELECTED_LOCATION)
    }

    pub fn set_selected_location(&self, location: &Location) -> Result<()> {
        self.set(keys::SELECTED_LOCATION, location)
    }

    pub fn bookings(&self) -> Result<Vec<BookingRecord>> {
        self.get_list(keys::BOOKINGS)
    }

    /// Append to the stored bookings as one locked read-modify-write.
    /// `select` sees the current records and returns the ones to add.
    pub fn append_bookings(
        &self,
        select: impl FnOnce(&[BookingRecord]) -> Vec<BookingRecord>,
    ) -> Result<usize> {
        self.append_list(keys::BOOKINGS, select)
    }

    pub fn reminders(&self) -> Result<Vec<Reminder>> {
        self.get_list(keys::REMINDERS)
    }

    /// Append to the persisted reminder list. No deduplication.
    pub fn append_reminders(&self, new: &[Reminder]) -> Result<()> {
        if new.is_empty() {
            return Ok(());
        }
        self.append_list(keys::REMINDERS, |_: &[Reminder]| new.to_vec())?;
        Ok(())
    }

    /// Entries of the list under `key`; entries that no longer decode are
    /// skipped one by one.
    fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.kv.get(key)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(decode_entries(key, &items)),
            Some(_) => {
                warn!(key, "stored value is not a list, reading as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Raw stored entries are carried over untouched, including ones that
    /// no longer decode. A non-list value is never overwritten.
    fn append_list<T, F>(&self, key: &str, select: F) -> Result<usize>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&[T]) -> Vec<T>,
    {
        let mut select = Some(select);
        let mut appended = 0;
        self.kv.update(key, &mut |current| {
            let mut raw = match current {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(_) => bail!("refusing to append to '{key}': stored value is not a list"),
            };
            let select = select
                .take()
                .ok_or_else(|| anyhow!("list update for '{key}' applied twice"))?;
            let new = select(&decode_entries::<T>(key, &raw));
            appended = new.len();
            if new.is_empty() {
                return Ok(None);
            }
            for entry in &new {
                raw.push(
                    serde_json::to_value(entry)
                        .with_context(|| format!("failed to encode '{key}' entry"))?,
                );
            }
            Ok(Some(Value::Array(raw)))
        })?;
        Ok(appended)
    }
}

fn decode_entries<T: DeserializeOwned>(key: &str, items: &[Value]) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(key, index, %error, "skipping undecodable stored entry");
                None
            }
        })
        .collect()
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}
