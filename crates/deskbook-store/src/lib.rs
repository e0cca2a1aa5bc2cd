//! Local persistence for deskbook.
//!
//! Everything the host keeps between runs lives in one key-value namespace
//! (the browser's extension storage on the other side of the wire). Reads
//! always go to the backend, so no component holds a second copy of state.

pub mod credential;
pub mod file;
pub mod kv;
pub mod state;

pub use credential::CredentialStore;
pub use file::JsonFileStore;
pub use kv::{KvStore, MemoryStore};
pub use state::StateStore;
