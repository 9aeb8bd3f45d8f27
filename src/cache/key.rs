//! Request key builder
//!
//! Helper for proxy layers that need a stable identity string per cacheable
//! request. The cache itself treats keys as opaque.

// == Request Key ==
/// Builds `"{domain}:{METHOD}:{path}"`, appending `?{query}` when present.
///
/// The method is upper-cased and query pairs are sorted so that parameter
/// order does not split one resource across several entries.
///
/// # Arguments
/// * `domain` - Host the request was routed for
/// * `method` - HTTP method
/// * `path` - Request path without the query
/// * `query` - Raw query string without the leading `?`
pub fn request_key(domain: &str, method: &str, path: &str, query: Option<&str>) -> String {
    let method = method.to_ascii_uppercase();
    match query.map(canonical_query).filter(|q| !q.is_empty()) {
        Some(query) => format!("{}:{}:{}?{}", domain, method, path, query),
        None => format!("{}:{}:{}", domain, method, path),
    }
}

fn canonical_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .collect();
    pairs.sort_unstable();
    pairs.join("&")
}
