//! Response header allow-list
//!
//! Only a handful of representation headers are worth replaying from cache;
//! everything else (cookies, hop-by-hop headers, dates) is dropped on store.

use std::collections::HashMap;

/// Header name to single value.
pub type Headers = HashMap<String, String>;

/// Canonical spellings of the headers a cache entry may carry.
pub const CACHEABLE_HEADERS: [&str; 6] = [
    "Content-Type",
    "Content-Encoding",
    "Content-Language",
    "Cache-Control",
    "Content-Disposition",
    "ETag",
];

/// Returns the canonical name if `name` is on the allow-list.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    CACHEABLE_HEADERS
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(name.trim()))
}

/// Copies the allow-listed headers out of `headers`, keyed by canonical name.
///
/// When one header appears under several spellings, the canonical spelling
/// wins, then the lexicographically smallest name.
pub fn retain_cacheable(headers: &Headers) -> Headers {
    let mut candidates: Vec<(&'static str, &String, &String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            canonical_name(name).map(|canonical| (canonical, name, value))
        })
        .collect();
    candidates.sort_by_key(|&(canonical, name, _)| (name.as_str() != canonical, name.as_str()));

    let mut kept = Headers::new();
    for (canonical, _, value) in candidates {
        kept.entry(canonical.to_string()).or_insert_with(|| value.clone());
    }
    kept
}
