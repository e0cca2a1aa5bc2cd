use std::collections::BTreeMap;
use std::sync::OnceLock;

use deskbook_core::message::HeaderEntry;
use regex::Regex;
use url::Url;

fn bearer_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)bearer\s+(.+)").ok())
        .as_ref()
}

/// Token part of an `Authorization` value, scheme matched case-insensitively.
pub fn extract_bearer(value: &str) -> Option<String> {
    let captures = bearer_pattern()?.captures(value)?;
    let token = captures.get(1)?.as_str().trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Whether `url` points at `domain` or one of its subdomains.
pub fn is_capture_url(url: &str, domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Token from the first `Authorization` header carrying a bearer value.
pub(crate) fn bearer_from_headers(headers: &[HeaderEntry]) -> Option<String> {
    headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("authorization"))
        .find_map(|header| extract_bearer(&header.value))
}

/// Fold a request's header list into a name -> value snapshot. Later
/// duplicates win.
pub(crate) fn header_snapshot(headers: &[HeaderEntry]) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|header| (header.name.clone(), header.value.clone()))
        .collect()
}
