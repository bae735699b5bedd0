//! Engagement count parsing (`"1234"`, `"1.5k"`).

use std::sync::LazyLock;

use regex::Regex;

use storyfeed_shared::{Result, StoryFeedError};

/// Parse a displayed upvote count.
///
/// Digit-only strings parse directly. Strings ending in `k` parse as
/// `prefix × 1000`, truncated toward zero. Anything else is
/// [`StoryFeedError::InvalidCountFormat`]. Surrounding whitespace is ignored.
pub fn parse_count(text: &str) -> Result<u32> {
    static DIGITS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));
    static THOUSANDS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)k$").expect("valid regex"));

    let trimmed = text.trim();
    let invalid = || StoryFeedError::InvalidCountFormat(text.to_string());

    if DIGITS_RE.is_match(trimmed) {
        return trimmed.parse::<u32>().map_err(|_| invalid());
    }

    let caps = THOUSANDS_RE.captures(trimmed).ok_or_else(invalid)?;
    let prefix: f64 = caps[1].parse().map_err(|_| invalid())?;
    let value = (prefix * 1000.0).trunc();
    if value > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(value as u32)
}
