//! Size Parser Module
//!
//! Converts human-readable size strings ("100MB") into byte counts.

use crate::error::{CacheError, Result};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

// == Parse Size ==
/// Parses a size string with an optional `KB`, `MB` or `GB` suffix.
///
/// Units are 1024-based and matched case-insensitively. A bare number is a
/// byte count.
///
/// # Errors
/// Returns [`CacheError::InvalidSize`] for empty input, a malformed numeric
/// part, or a value that overflows `u64`.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CacheError::InvalidSize("empty size string".to_string()));
    }

    let (number, multiplier) = split_unit(trimmed);
    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CacheError::InvalidSize(format!("malformed size {:?}", input)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| CacheError::InvalidSize(format!("size {:?} overflows", input)))
}

/// Like [`parse_size`], but substitutes `default` when the string is invalid.
pub fn parse_size_or(input: &str, default: u64) -> u64 {
    match parse_size(input) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("{}, falling back to {} bytes", err, default);
            default
        }
    }
}

fn split_unit(s: &str) -> (&str, u64) {
    if s.len() > 2 && s.is_char_boundary(s.len() - 2) {
        let (number, suffix) = s.split_at(s.len() - 2);
        let multiplier = match suffix.to_ascii_uppercase().as_str() {
            "KB" => Some(KB),
            "MB" => Some(MB),
            "GB" => Some(GB),
            _ => None,
        };
        if let Some(multiplier) = multiplier {
            return (number, multiplier);
        }
    }
    (s, 1)
}
