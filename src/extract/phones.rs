//! Phone number extraction and normalization

use crate::extract::text::element_text;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

/// Patterns tried in order; a later match overlapping an earlier one is ignored
static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // International: +44 20 7946 0958, +1 (555) 123-4567
        r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,4}",
        // US: (555) 123-4567, 555.123.4567, 1-555-123-4567
        r"(?:1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}",
        // Generic grouped digits: 0123 456 7890
        r"\d{2,4}[\s.-]\d{3,4}[\s.-]\d{3,4}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hardcoded regex pattern is valid"))
    .collect()
});

static TEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("hardcoded selector is valid"));

static TELEPHONE_PROP: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[itemprop="telephone"]"#).expect("hardcoded selector is valid")
});

/// Strips everything but digits (and a leading `+`), drops a US country
/// code in front of ten digits and formats ten-digit numbers as
/// `(XXX) XXX-XXXX`
pub fn clean_phone(raw: &str) -> String {
    let raw = raw.trim();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let national = match digits.strip_prefix('1') {
        Some(rest) if rest.len() == 10 => rest,
        _ => digits.as_str(),
    };

    if national.len() == 10 {
        return format!(
            "({}) {}-{}",
            &national[..3],
            &national[3..6],
            &national[6..]
        );
    }

    if raw.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Whether a cleaned number has 10 to 15 digits and is not one digit repeated
pub fn is_valid_phone(phone: &str) -> bool {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if !(10..=15).contains(&digits.len()) {
        return false;
    }
    digits.iter().any(|d| *d != digits[0])
}

/// Collects phone numbers from visible text, `tel:` links and
/// `itemprop="telephone"` elements
///
/// # Returns
///
/// Cleaned, valid, de-duplicated numbers in first-seen order
pub fn extract_phones(document: &Html, text: &str) -> Vec<String> {
    let mut candidates = text_matches(text);

    for anchor in document.select(&TEL_ANCHOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        // The prefix is ASCII, so slicing after it stays on a char boundary
        if href.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("tel:")) {
            candidates.push(href[4..].to_string());
        }
    }

    for element in document.select(&TELEPHONE_PROP) {
        let value = element
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(element));
        candidates.push(value);
    }

    dedup_phones(
        candidates
            .iter()
            .map(|candidate| clean_phone(candidate))
            .filter(|phone| is_valid_phone(phone)),
    )
}

pub(crate) fn dedup_phones(phones: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    phones
        .into_iter()
        .filter(|phone| seen.insert(phone.clone()))
        .collect()
}

/// Regex matches in `text` that are not part of a longer digit run
fn text_matches(text: &str) -> Vec<String> {
    let mut taken: Vec<Range<usize>> = Vec::new();
    let mut found: Vec<(usize, String)> = Vec::new();

    for pattern in PHONE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let range = m.range();
            let glued = text[..range.start].ends_with(|c: char| c.is_ascii_digit())
                || text[range.end..].starts_with(|c: char| c.is_ascii_digit());
            let overlaps = taken
                .iter()
                .any(|t| t.start < range.end && range.start < t.end);
            if glued || overlaps {
                continue;
            }
            found.push((range.start, m.as_str().to_string()));
            taken.push(range);
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, phone)| phone).collect()
}
