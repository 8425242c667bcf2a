//! Email address extraction
//!
//! Candidates come from four places: plain addresses anywhere in the raw
//! HTML, bracket-obfuscated addresses (`name [at] host [dot] com`),
//! `mailto:` anchors and the `email` field of JSON-LD blocks. Every
//! candidate is validated, then the list is de-duplicated ignoring case.

use crate::extract::structured::json_ld_blocks;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static STANDARD_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("hardcoded regex pattern is valid")
});

static OBFUSCATED_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[A-Za-z0-9._%+-]+\s*[\[({]\s*at\s*[\])}]\s*[A-Za-z0-9-]+(?:\s*[\[({]\s*dot\s*[\])}]\s*[A-Za-z0-9-]+)+",
    )
    .expect("hardcoded regex pattern is valid")
});

static MAILTO_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)mailto:([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})")
        .expect("hardcoded regex pattern is valid")
});

static AT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[({]\s*at\s*[\])}]\s*").expect("hardcoded regex pattern is valid")
});

static DOT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[({]\s*dot\s*[\])}]\s*").expect("hardcoded regex pattern is valid")
});

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$",
    )
    .expect("hardcoded regex pattern is valid")
});

static MAILTO_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("hardcoded selector is valid"));

/// Domains used as stand-ins in templates and docs
pub const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
    "domain.com",
    "email.com",
    "yourdomain.com",
    "yoursite.com",
    "yourcompany.com",
    "sentry.io",
    "wixpress.com",
];

/// Suffixes that mark an asset file name that happens to contain `@`
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp", ".css", ".js",
];

/// Whether `email` looks like a real, reachable address
///
/// Rejects asset file names (`logo@2x.png`), placeholder domains
/// (`example.com` and friends) and anything not shaped like an address.
pub fn is_valid_email(email: &str) -> bool {
    validate_email(email, &[])
}

/// Like `is_valid_email`, also rejecting `extra_placeholders` and their
/// subdomains
pub fn validate_email(email: &str, extra_placeholders: &[String]) -> bool {
    let email = email.trim().to_ascii_lowercase();
    if !EMAIL_SHAPE.is_match(&email) {
        return false;
    }

    if ASSET_EXTENSIONS.iter().any(|ext| email.ends_with(ext)) {
        return false;
    }

    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let is_placeholder = |placeholder: &str| {
        domain == placeholder
            || domain
                .strip_suffix(placeholder)
                .is_some_and(|rest| rest.ends_with('.'))
    };

    !PLACEHOLDER_DOMAINS.iter().any(|p| is_placeholder(p))
        && !extra_placeholders
            .iter()
            .any(|p| is_placeholder(&p.trim().to_ascii_lowercase()))
}

/// Rewrites `name [at] host [dot] com` as `name@host.com`
pub fn deobfuscate(candidate: &str) -> String {
    let replaced = AT_TOKEN.replace_all(candidate, "@");
    DOT_TOKEN.replace_all(&replaced, ".").into_owned()
}

/// Collects, validates and de-duplicates the email addresses on a page
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `html` - The raw HTML the document was parsed from
/// * `extra_placeholders` - Domains to reject on top of the built-in list
///
/// # Returns
///
/// Lowercased addresses in first-seen order
pub fn extract_emails(document: &Html, html: &str, extra_placeholders: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    candidates.extend(STANDARD_EMAIL.find_iter(html).map(|m| m.as_str().to_string()));
    candidates.extend(OBFUSCATED_EMAIL.find_iter(html).map(|m| deobfuscate(m.as_str())));
    candidates.extend(
        MAILTO_EMAIL
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
    );

    for anchor in document.select(&MAILTO_ANCHOR) {
        if let Some(address) = anchor.value().attr("href").and_then(mailto_address) {
            candidates.push(address);
        }
    }

    for block in json_ld_blocks(document) {
        collect_json_emails(&block, &mut candidates);
    }

    dedup_emails(
        candidates
            .into_iter()
            .map(|candidate| candidate.trim().to_ascii_lowercase())
            .filter(|candidate| validate_email(candidate, extra_placeholders)),
    )
}

/// De-duplicates ignoring case, keeping first-seen order
pub(crate) fn dedup_emails(emails: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .filter(|email| seen.insert(email.to_ascii_lowercase()))
        .collect()
}

/// The address of a `mailto:` href, without query or fragment
fn mailto_address(href: &str) -> Option<String> {
    let href = href.trim();
    let prefix = href.get(..7)?;
    if !prefix.eq_ignore_ascii_case("mailto:") {
        return None;
    }

    let address = href[7..]
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    (!address.is_empty()).then(|| address.to_string())
}

/// Walks a JSON-LD value collecting every `email` field
fn collect_json_emails(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "email" {
                    match value {
                        Value::String(email) => out.push(strip_mailto(email)),
                        Value::Array(items) => out.extend(
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(strip_mailto),
                        ),
                        _ => {}
                    }
                } else {
                    collect_json_emails(value, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_json_emails(item, out)),
        _ => {}
    }
}

fn strip_mailto(value: &str) -> String {
    mailto_address(value).unwrap_or_else(|| value.trim().to_string())
}
