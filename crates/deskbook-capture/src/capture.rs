use std::collections::BTreeMap;

use anyhow::Result;
use deskbook_core::Credential;
use deskbook_core::message::{HeaderEntry, HostEvent, StorageEntry};
use deskbook_store::CredentialStore;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::header::{bearer_from_headers, header_snapshot, is_capture_url};
use crate::page::{is_plausible_token, token_from_storage};

const EVENT_CAPACITY: usize = 16;

/// Feeds observed tokens into the [`CredentialStore`] and announces each
/// capture on a broadcast channel.
///
/// Capture paths never fail: storage errors are logged and reported as
/// "nothing captured", since an absent token just means unauthenticated.
#[derive(Debug, Clone)]
pub struct TokenCapture {
    credentials: CredentialStore,
    capture_domain: String,
    events: broadcast::Sender<HostEvent>,
}

impl TokenCapture {
    pub fn new(credentials: CredentialStore, capture_domain: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            credentials,
            capture_domain: capture_domain.into(),
            events,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Receive a `TokenCaptured` event for every successful capture.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    /// Explicit push of a token and header snapshot (`setToken`).
    pub fn set_token(&self, token: &str, headers: BTreeMap<String, String>) -> Result<()> {
        self.credentials.set(&Credential::new(token, headers))
    }

    /// Inspect one outgoing request's headers.
    pub fn observe_request(&self, url: &str, headers: &[HeaderEntry]) -> bool {
        if !is_capture_url(url, &self.capture_domain) {
            return false;
        }
        let Some(token) = bearer_from_headers(headers) else {
            return false;
        };
        self.publish(Credential::new(token, header_snapshot(headers)), "request header")
    }

    /// Inspect a loaded platform page's client-side storage entries.
    pub fn inspect_page_storage(&self, url: &str, entries: &[StorageEntry]) -> bool {
        if !is_capture_url(url, &self.capture_domain) {
            debug!(url, "page is not on the capture domain");
            return false;
        }
        match token_from_storage(entries) {
            Some(token) => self.publish(Credential::new(token, BTreeMap::new()), "page storage"),
            None => false,
        }
    }

    /// A token the page script pushed directly (`tokenFromPage`).
    pub fn token_from_page(&self, token: &str) -> bool {
        let token = token.trim();
        if !is_plausible_token(token) {
            debug!("discarding implausibly short page token");
            return false;
        }
        self.publish(Credential::new(token, BTreeMap::new()), "page script")
    }

    fn publish(&self, credential: Credential, source: &'static str) -> bool {
        if let Err(error) = self.credentials.set(&credential) {
            warn!(source, error = %format!("{error:#}"), "failed to store captured token");
            return false;
        }
        info!(source, "captured bearer token");
        // No subscribers is fine.
        let _ = self.events.send(HostEvent::TokenCaptured {
            token: credential.token,
        });
        true
    }
}
