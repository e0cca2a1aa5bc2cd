use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

use crate::kv::KvStore;

const LOCK_SUFFIX: &str = "lock";

/// Key-value store backed by a single JSON object on disk.
///
/// Writes take an exclusive `fd-lock` on a sibling lock file, re-read the
/// current document, apply the change and atomically replace the file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension(LOCK_SUFFIX)
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                warn!(
                    path = %self.path.display(),
                    kind = json_kind(&other),
                    "state file is not a JSON object, starting empty"
                );
                Ok(Map::new())
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "state file is corrupt, starting empty"
                );
                Ok(Map::new())
            }
        }
    }

    /// Acquire the write lock, mutate the document, then persist it unless
    /// `f` reports nothing changed.
    fn modify(&self, f: impl FnOnce(&mut Map<String, Value>) -> Result<bool>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state dir: {}", parent.display()))?;

        let lock_path = self.lock_path();
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file: {}", lock_path.display()))?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| anyhow::anyhow!("failed to acquire state write lock: {e}"))?;

        let mut document = self.read_document()?;
        if !f(&mut document)? {
            return Ok(());
        }
        let content = serde_json::to_vec_pretty(&Value::Object(document))
            .context("failed to serialize state")?;
        atomic_write(&self.path, &content)
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.modify(|doc| {
            doc.insert(key.to_string(), value);
            Ok(true)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|doc| Ok(doc.remove(key).is_some()))
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        self.modify(|doc| match apply(doc.get(key).cloned())? {
            Some(value) => {
                doc.insert(key.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<()> {
        self.modify(|doc| {
            for (key, value) in entries {
                doc.insert(key.to_string(), value);
            }
            Ok(true)
        })
    }
}

/// Write data to a file atomically using temp-file + rename.
fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target.parent().context("Target path has no parent")?;
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    std::io::Write::write_all(&mut tmp, data).context("Failed to write temp file")?;
    set_file_mode_600(tmp.path())?;

    tmp.persist(target)
        .with_context(|| format!("Failed to persist to {}", target.display()))?;

    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// The state file holds a bearer token.
#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod 600: {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    fn test_set_is_visible_to_a_second_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let writer = JsonFileStore::new(&path);
        let reader = JsonFileStore::new(&path);

        writer.set("token", json!("abc123")).unwrap();
        assert_eq!(reader.get("token").unwrap(), Some(json!("abc123")));

        writer.remove("token").unwrap();
        assert_eq!(reader.get("token").unwrap(), None);
    }

    #[test]
    fn test_set_preserves_other_keys() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        store.set("bookings", json!([{"date": "2025-03-10"}])).unwrap();
        store
            .set_many(vec![("token", json!("t")), ("headers", json!({}))])
            .unwrap();

        assert_eq!(
            store.get("bookings").unwrap(),
            Some(json!([{"date": "2025-03-10"}]))
        );
        assert_eq!(store.get("token").unwrap(), Some(json!("t")));
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty_and_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("token").unwrap(), None);

        store.set("token", json!("fresh")).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, json!({"token": "fresh"}));
    }

    #[test]
    fn test_concurrent_updates_from_separate_handles_all_land() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let workers: Vec<_> = (0..2)
            .map(|worker| {
                let store = JsonFileStore::new(&path);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .update("items", &mut |current| {
                                let mut items = match current {
                                    Some(Value::Array(items)) => items,
                                    _ => Vec::new(),
                                };
                                items.push(json!(format!("{worker}-{i}")));
                                Ok(Some(Value::Array(items)))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let items = JsonFileStore::new(&path).get("items").unwrap().unwrap();
        assert_eq!(items.as_array().unwrap().len(), 100);
    }

    #[test]
    fn test_update_returning_none_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);
        store.update("token", &mut |_| Ok(None)).unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        JsonFileStore::new(&path).set("token", json!("abc")).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
