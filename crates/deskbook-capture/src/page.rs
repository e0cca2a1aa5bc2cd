use deskbook_core::message::StorageEntry;
use serde_json::Value;

/// Page-side tokens at or below this length are not plausible bearer tokens.
pub const MIN_PAGE_TOKEN_LEN: usize = 20;

const KEY_HINTS: [&str; 3] = ["auth0", "token", "access"];
const TOKEN_FIELDS: [&str; 4] = ["access_token", "accessToken", "idToken", "id_token"];

/// Scan client-side storage for something that looks like an access token.
///
/// Entries are visited in order; the first key hinting at a credential that
/// yields a plausible token wins.
pub fn token_from_storage(entries: &[StorageEntry]) -> Option<String> {
    entries
        .iter()
        .filter(|entry| key_suggests_token(&entry.key))
        .find_map(|entry| token_from_value(&entry.value))
}

fn key_suggests_token(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    KEY_HINTS.iter().any(|hint| key.contains(hint))
}

fn token_from_value(raw: &str) -> Option<String> {
    let candidate = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => TOKEN_FIELDS
            .iter()
            .find_map(|field| map.get(*field)?.as_str().map(str::to_string))?,
        // Valid JSON that is not an object carries no token fields.
        Ok(Value::String(inner)) => inner,
        Ok(_) => return None,
        Err(_) => raw.to_string(),
    };
    is_plausible_token(&candidate).then_some(candidate)
}

pub(crate) fn is_plausible_token(token: &str) -> bool {
    token.trim().len() > MIN_PAGE_TOKEN_LEN
}
