//! Canonical identifiers derived from product names.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^a-z0-9\s-]").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[\s-]+").unwrap();
}

/// Derive a URL-safe identifier from a product name.
///
/// The name is lower-cased, every character other than `a-z`, `0-9`,
/// whitespace and `-` is dropped, separator runs collapse to a single
/// hyphen, and leading/trailing hyphens are trimmed. Hyphens count as
/// separators so that an already-valid slug maps onto itself.
///
/// ```
/// use catalog_sync_lib::domain::slug::slug;
/// assert_eq!(slug("Royal Anarkali Set — 3 Pc."), "royal-anarkali-set-3-pc");
/// ```
pub fn slug(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = DISALLOWED.replace_all(&lower, "");
    let hyphenated = SEPARATORS.replace_all(&stripped, "-");
    hyphenated.trim_matches('-').to_string()
}

/// Whether `candidate` is already in canonical slug form.
pub fn is_slug(candidate: &str) -> bool {
    !candidate.is_empty() && slug(candidate) == candidate
}
