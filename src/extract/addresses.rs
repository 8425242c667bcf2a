//! Postal address extraction

use crate::extract::text::{clean_text, element_text};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;

static STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,6}\s+(?:[A-Z][A-Za-z0-9.'-]*\s+){1,5}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl|Parkway|Pkwy|Square|Sq|Terrace|Highway|Hwy)\b\.?",
    )
    .expect("hardcoded regex pattern is valid")
});

/// US ZIP, UK postcode and Canadian postal code, tried in that order
static POSTAL_CODES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{5}(?:-\d{4})?\b",
        r"\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b",
        r"\b[A-Z]\d[A-Z]\s?\d[A-Z]\d\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("hardcoded regex pattern is valid"))
    .collect()
});

static ADDRESS_ELEMENTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[itemprop="address"], address"#).expect("hardcoded selector is valid")
});

/// A postal address; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Whole address as displayed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip.is_none()
            && self.country.is_none()
            && self.full.is_none()
    }
}

/// First postal code found in `text`
pub fn find_postal_code(text: &str) -> Option<String> {
    POSTAL_CODES
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|m| m.as_str().to_string())
}

/// Street fragments from visible text plus marked-up address elements
///
/// Text fragments are paired with the first postal code on the page.
/// Marked-up addresses are split into schema.org sub-fields, keeping the
/// element's full text as well.
pub fn extract_addresses(document: &Html, text: &str) -> Vec<Address> {
    let zip = find_postal_code(text);
    let mut addresses: Vec<Address> = STREET
        .find_iter(text)
        .map(|m| Address {
            street: Some(clean_text(m.as_str())),
            zip: zip.clone(),
            ..Address::default()
        })
        .collect();

    for element in document.select(&ADDRESS_ELEMENTS) {
        // `<address itemprop="address">` matches both selectors but is visited once
        let full = non_empty(element_text(element));
        let address = Address {
            street: property(element, "streetAddress"),
            city: property(element, "addressLocality"),
            state: property(element, "addressRegion"),
            zip: property(element, "postalCode"),
            country: property(element, "addressCountry"),
            full,
        };
        addresses.push(address);
    }

    let mut unique: Vec<Address> = Vec::new();
    for address in addresses {
        if !address.is_empty() && !unique.contains(&address) {
            unique.push(address);
        }
    }
    unique
}

fn property(scope: ElementRef<'_>, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"[itemprop="{}"]"#, name)).ok()?;
    scope.select(&selector).find_map(|element| {
        let value = element
            .value()
            .attr("content")
            .map(clean_text)
            .unwrap_or_else(|| element_text(element));
        non_empty(value)
    })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
