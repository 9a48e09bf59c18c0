//! Entity name normalization.
//!
//! The normalized name is half of the deduplication key, so every function
//! here is idempotent: normalizing a normalized name returns it unchanged.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::EntityType;

lazy_static! {
    static ref US_DATE: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap();
}

/// Normalize a raw entity name for its type.
///
/// - all types: trim and collapse internal whitespace
/// - person, location: title case per word
/// - organization: capitalization preserved (`IBM` and `ibm` stay distinct)
/// - date: `MM/DD/YYYY` rewritten to `YYYY-MM-DD`, anything else unchanged
pub fn normalize_name(raw: &str, entity_type: EntityType) -> String {
    let collapsed = collapse_whitespace(raw);
    match entity_type {
        EntityType::Person | EntityType::Location => title_case(&collapsed),
        EntityType::Date => normalize_date(&collapsed),
        _ => collapsed,
    }
}

/// Trim and collapse runs of whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase the first letter of each word (and of each hyphenated part), lowercase the rest.
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A first letter whose uppercase form is several characters (`ß`, `ﬁ`)
/// stays lowercase; expanding it would change the word on the next pass.
fn capitalize(part: &str) -> String {
    let lower = part.to_lowercase();
    let mut chars = lower.chars();
    let Some(first) = chars.next() else {
        return lower;
    };
    let mut upper = first.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => std::iter::once(single).chain(chars).collect(),
        _ => lower,
    }
}

/// Best-effort `MM/DD/YYYY → YYYY-MM-DD`.
///
/// Spelled-out and other locale-dependent forms pass through unchanged.
pub fn normalize_date(s: &str) -> String {
    if let Some(caps) = US_DATE.captures(s) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        if (1..=12).contains(&month) && (1..=31).contains(&day) {
            return format!("{}-{:02}-{:02}", &caps[3], month, day);
        }
    }
    s.to_string()
}
