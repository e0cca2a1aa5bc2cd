use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use deskbook_core::Credential;
use serde_json::Value;
use tracing::debug;

use crate::state::{StateStore, keys};

/// The one bearer token deskbook acts with.
///
/// Every read goes to the backing store; there is no in-memory copy that
/// could drift from what was last persisted.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    state: StateStore,
}

impl CredentialStore {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Overwrite the stored credential wholesale (last write wins).
    pub fn set(&self, credential: &Credential) -> Result<()> {
        let headers = serde_json::to_value(&credential.auxiliary_headers)
            .context("failed to encode captured headers")?;
        self.state.kv().set_many(vec![
            (keys::TOKEN, Value::String(credential.token.clone())),
            (keys::HEADERS, headers),
            (
                keys::TOKEN_CAPTURED_AT,
                Value::String(credential.captured_at.to_rfc3339()),
            ),
        ])?;
        debug!(
            headers = credential.auxiliary_headers.len(),
            "stored bearer token"
        );
        Ok(())
    }

    /// Current credential, or `None` while unauthenticated.
    pub fn get(&self) -> Result<Option<Credential>> {
        let Some(token) = self.token()? else {
            return Ok(None);
        };
        let auxiliary_headers: BTreeMap<String, String> =
            self.state.get(keys::HEADERS)?.unwrap_or_default();
        let captured_at: DateTime<Utc> = self
            .state
            .get(keys::TOKEN_CAPTURED_AT)?
            .unwrap_or_default();
        Ok(Some(Credential {
            token,
            auxiliary_headers,
            captured_at,
        }))
    }

    /// Usable token only: empty strings count as absent.
    pub fn token(&self) -> Result<Option<String>> {
        let token: Option<String> = self.state.get(keys::TOKEN)?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }

    pub fn clear(&self) -> Result<()> {
        let kv = self.state.kv();
        kv.remove(keys::TOKEN)?;
        kv.remove(keys::HEADERS)?;
        kv.remove(keys::TOKEN_CAPTURED_AT)
    }
}
