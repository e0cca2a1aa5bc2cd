use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde_json::Value;

/// Flat key-value storage holding JSON values.
///
/// Implementations must make every `set` visible to the next `get`, including
/// `get`s issued through a different handle to the same backend.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Read-modify-write of one key, exclusive against every other writer
    /// of the same backend. `apply` receives the current value and returns
    /// the replacement, or `None` to leave the key untouched.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()>;

    /// Apply several writes as one unit.
    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Process-local backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        let mut map = self.lock()?;
        if let Some(value) = apply(map.get(key).cloned())? {
            map.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<()> {
        let mut map = self.lock()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value);
        }
        Ok(())
    }
}
