//! Rule-based entity extraction for natural-language text.
//!
//! Independent regex passes run in a fixed order (date, organization,
//! person, location, product). A span claimed by an earlier pass is not
//! reused by a later one, so `Acme Corp` is never also a person.

use std::ops::Range;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::{context_window, ExtractionStrategy, ExtractionUnit, StrategyOutput};
use crate::error::ExtractionError;
use crate::types::{Entity, EntityType, ExtractionOptions, Mention};

const DATE_RELEVANCE: f32 = 0.8;
const PERSON_RELEVANCE: f32 = 0.75;
const ORGANIZATION_RELEVANCE: f32 = 0.7;
const LOCATION_RELEVANCE: f32 = 0.65;
const PRODUCT_RELEVANCE: f32 = 0.6;

const MONTHS: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

/// Capitalized words that start sentences or name calendar units rather than entities.
const STOPWORDS: &[&str] = &[
    "The", "A", "An", "This", "That", "These", "Those", "It", "He", "She", "We", "They", "I",
    "You", "In", "On", "At", "For", "From", "With", "By", "Of", "And", "But", "Or", "If", "When",
    "While", "After", "Before", "Since", "During", "Yesterday", "Today", "Tomorrow", "Our",
    "Their", "His", "Her", "My", "Your", "Its", "There", "Here", "Then", "So", "As", "To", "Dear",
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "January",
    "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December", "Mr", "Mrs", "Ms", "Dr", "Prof",
];

const PRODUCT_SUFFIXES: &[&str] = &["Pro", "Plus", "Max", "Mini", "Ultra", "Lite", "Edition", "Studio"];

/// Well-known places, longest names first so multi-word names win.
const GAZETTEER: &[&str] = &[
    "United States", "United Kingdom", "San Francisco", "Los Angeles", "New York", "Hong Kong",
    "New Delhi", "Buenos Aires", "Mexico City", "South Africa", "New Zealand", "California",
    "Singapore", "Amsterdam", "Barcelona", "Melbourne", "Australia", "Germany", "Toronto",
    "Chicago", "Seattle", "Beijing", "Shanghai", "Houston", "Austin", "Boston", "London",
    "Berlin", "Munich", "Madrid", "Lisbon", "Dublin", "Vienna", "Zurich", "Geneva", "Prague",
    "Warsaw", "Moscow", "Mumbai", "Dubai", "Cairo", "Lagos", "Nairobi", "Sydney", "Tokyo",
    "Osaka", "Seoul", "Paris", "Rome", "Milan", "Europe", "Africa", "Asia", "France", "Spain",
    "Italy", "Japan", "China", "India", "Canada", "Brazil", "Mexico", "England", "Texas",
];

lazy_static! {
    static ref DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(),
        Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap(),
        Regex::new(&format!(r"\b{MONTHS}\.?[ \t]+\d{{1,2}}(?:st|nd|rd|th)?,?[ \t]+\d{{4}}\b")).unwrap(),
        Regex::new(&format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?[ \t]+{MONTHS}\.?,?[ \t]+\d{{4}}\b")).unwrap(),
    ];
    static ref ORGANIZATION: Regex = Regex::new(
        r"\b(?:[A-Z][A-Za-z0-9&'-]*[ \t]+){1,3}(?:Inc|Corp|Corporation|LLC|Ltd|GmbH|PLC|Company|Group|Technologies|Labs)\b"
    )
    .unwrap();
    static ref HONORIFIC_PERSON: Regex = Regex::new(
        r"\b(?:Mr|Mrs|Ms|Dr|Prof|Sir|Dame)\.?[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)\b"
    )
    .unwrap();
    static ref BIGRAM_PERSON: Regex = Regex::new(r"\b([A-Z][a-z]+)[ \t]+([A-Z][a-z]+)\b").unwrap();
    static ref GAZETTEER_LOCATION: Regex = Regex::new(&format!(
        r"\b(?:{})\b",
        GAZETTEER.iter().map(|p| regex::escape(p)).collect::<Vec<_>>().join("|")
    ))
    .unwrap();
    static ref ANCHORED_LOCATION: Regex = Regex::new(
        r"\b(?:in|near|from|across|outside|throughout)[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)\b"
    )
    .unwrap();
    static ref PRODUCT: Regex = Regex::new(&format!(
        r"\b(?:[A-Za-z][A-Za-z0-9]*[ \t]+){{1,2}}(?:{})\b",
        PRODUCT_SUFFIXES.join("|")
    ))
    .unwrap();
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word.trim_end_matches('.'))
}

/// A candidate match in unit-local byte coordinates.
#[derive(Debug, Clone)]
struct Found {
    name: String,
    /// Span recorded as the mention position
    name_span: Range<usize>,
    /// Span reserved against later passes
    claim: Range<usize>,
    entity_type: EntityType,
    relevance: f32,
}

/// Matches accepted so far plus the spans they reserve.
#[derive(Default)]
struct Scan {
    claims: Vec<Range<usize>>,
    found: Vec<Found>,
}

impl Scan {
    fn overlaps(&self, span: &Range<usize>) -> bool {
        self.claims.iter().any(|c| c.start < span.end && span.start < c.end)
    }

    fn accept(&mut self, found: Found) {
        if self.overlaps(&found.claim) {
            return;
        }
        self.claims.push(found.claim.clone());
        self.found.push(found);
    }
}

/// Rule-based fallback for the text family.
#[derive(Debug, Default, Clone)]
pub struct TextRules;

impl TextRules {
    pub fn new() -> Self {
        Self
    }

    /// Run every pass over `text` and return matches in pass order.
    fn scan(&self, text: &str) -> Vec<Found> {
        let mut scan = Scan::default();

        for pattern in DATE_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                scan.accept(simple(m.as_str(), m.range(), EntityType::Date, DATE_RELEVANCE));
            }
        }

        for m in ORGANIZATION.find_iter(text) {
            if let Some((name, span)) = strip_leading_stopwords(text, m.range()) {
                scan.accept(simple(&name, span, EntityType::Organization, ORGANIZATION_RELEVANCE));
            }
        }

        for caps in HONORIFIC_PERSON.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            scan.accept(Found {
                name: name.as_str().to_string(),
                name_span: name.range(),
                claim: whole.range(),
                entity_type: EntityType::Person,
                relevance: PERSON_RELEVANCE,
            });
        }

        let mut at = 0;
        while let Some(caps) = BIGRAM_PERSON.captures_at(text, at) {
            let (Some(whole), Some(first), Some(second)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                break;
            };
            if is_stopword(first.as_str()) {
                // Retry with the second word as a possible first name
                at = second.start();
                continue;
            }
            at = whole.end();
            if is_stopword(second.as_str())
                || PRODUCT_SUFFIXES.contains(&second.as_str())
                || GAZETTEER.contains(&whole.as_str())
            {
                continue;
            }
            scan.accept(simple(whole.as_str(), whole.range(), EntityType::Person, PERSON_RELEVANCE));
        }

        for m in GAZETTEER_LOCATION.find_iter(text) {
            scan.accept(simple(m.as_str(), m.range(), EntityType::Location, LOCATION_RELEVANCE));
        }

        for caps in ANCHORED_LOCATION.captures_iter(text) {
            let Some(place) = caps.get(1) else { continue };
            if place.as_str().split_whitespace().next().map_or(true, is_stopword) {
                continue;
            }
            scan.accept(simple(place.as_str(), place.range(), EntityType::Location, LOCATION_RELEVANCE));
        }

        for m in PRODUCT.find_iter(text) {
            if let Some((name, span)) = strip_leading_lowercase(text, m.range()) {
                scan.accept(simple(&name, span, EntityType::Product, PRODUCT_RELEVANCE));
            }
        }

        scan.found
    }
}

fn simple(name: &str, span: Range<usize>, entity_type: EntityType, relevance: f32) -> Found {
    Found {
        name: name.to_string(),
        name_span: span.clone(),
        claim: span,
        entity_type,
        relevance,
    }
}

/// Drop leading sentence starters ("Yesterday Acme Corp" → "Acme Corp").
/// `None` if only the suffix would remain.
fn strip_leading_stopwords(text: &str, span: Range<usize>) -> Option<(String, Range<usize>)> {
    strip_leading(text, span, |word| is_stopword(word))
}

/// Drop leading words with no uppercase letter ("the iPhone Pro" keeps "iPhone Pro").
fn strip_leading_lowercase(text: &str, span: Range<usize>) -> Option<(String, Range<usize>)> {
    strip_leading(text, span, |word| is_stopword(word) || !word.chars().any(char::is_uppercase))
}

fn strip_leading<F>(text: &str, span: Range<usize>, drop: F) -> Option<(String, Range<usize>)>
where
    F: Fn(&str) -> bool,
{
    let matched = &text[span.clone()];
    let mut start = 0;
    let mut words = matched.split_whitespace().peekable();
    while let Some(word) = words.next() {
        // The last word is the suffix; never strip it
        if words.peek().is_none() || !drop(word) {
            break;
        }
        let word_start = matched[start..].find(word).map_or(start, |i| start + i);
        start = word_start + word.len();
    }
    let rest = &matched[start..];
    let trimmed = rest.trim_start();
    start += rest.len() - trimmed.len();
    if trimmed.split_whitespace().count() < 2 {
        return None;
    }
    Some((trimmed.to_string(), span.start + start..span.end))
}

#[async_trait]
impl ExtractionStrategy for TextRules {
    fn name(&self) -> &str {
        "text-rules"
    }

    async fn extract(
        &self,
        unit: &ExtractionUnit<'_>,
        options: &ExtractionOptions,
    ) -> Result<StrategyOutput, ExtractionError> {
        let text = unit.text();
        let entities = self
            .scan(&text)
            .into_iter()
            .filter(|f| !unit.in_overlap(f.name_span.end))
            .map(|f| {
                let context = context_window(&text, f.name_span.start, f.name_span.end, options.context_window);
                Entity::new(f.name, f.entity_type).with_mention(Mention::new(
                    context,
                    unit.absolute(f.name_span.start),
                    f.relevance,
                ))
            })
            .collect();
        Ok(StrategyOutput::new(entities))
    }
}
