//! Social profile links

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;
use url::Url;

static URL_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>()\\]+"#).expect("hardcoded regex pattern is valid")
});

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("hardcoded selector is valid"));

/// Path segments that mark share buttons and site chrome rather than a profile
const NON_PROFILE_SEGMENTS: &[&str] = &[
    "share",
    "sharer",
    "sharer.php",
    "sharearticle",
    "intent",
    "home",
    "login",
    "signup",
    "search",
    "hashtag",
    "explore",
    "dialog",
    "plugins",
    "p",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Linkedin,
    LinkedinCompany,
    Twitter,
    Facebook,
    Instagram,
    Github,
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linkedin => "linkedin",
            Self::LinkedinCompany => "linkedin_company",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Github => "github",
        };
        f.write_str(name)
    }
}

/// Which platform's profile a URL points to, if any
pub fn classify_profile_url(candidate: &str) -> Option<SocialPlatform> {
    let url = Url::parse(candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default();
    let first = segments.first()?;
    if NON_PROFILE_SEGMENTS.contains(&first.as_str()) {
        return None;
    }

    let on = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    if on("linkedin.com") {
        return match (first.as_str(), segments.len()) {
            ("in", 2..) => Some(SocialPlatform::Linkedin),
            ("company", 2..) => Some(SocialPlatform::LinkedinCompany),
            _ => None,
        };
    }
    if on("twitter.com") || on("x.com") {
        return Some(SocialPlatform::Twitter);
    }
    if on("facebook.com") || on("fb.com") {
        return Some(SocialPlatform::Facebook);
    }
    if on("instagram.com") {
        return Some(SocialPlatform::Instagram);
    }
    if on("github.com") {
        return Some(SocialPlatform::Github);
    }
    None
}

/// Profile URLs per platform, from URLs in the raw HTML and anchor hrefs
///
/// Share and intent links are skipped. Lists keep first-seen order and
/// platforms without profiles are left out.
pub fn extract_social(document: &Html, html: &str) -> BTreeMap<SocialPlatform, Vec<String>> {
    let mut candidates: Vec<String> = URL_CANDIDATE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .collect();
    candidates.extend(
        document
            .select(&ANCHOR)
            .filter_map(|anchor| anchor.value().attr("href"))
            .map(|href| href.trim().to_string()),
    );

    let mut profiles: BTreeMap<SocialPlatform, Vec<String>> = BTreeMap::new();
    for candidate in candidates {
        let candidate = candidate.trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if let Some(platform) = classify_profile_url(candidate) {
            profiles
                .entry(platform)
                .or_default()
                .push(candidate.to_string());
        }
    }

    for urls in profiles.values_mut() {
        dedup_urls(urls);
    }
    profiles
}

/// De-duplicates in place, ignoring a trailing slash
pub(crate) fn dedup_urls(urls: &mut Vec<String>) {
    let mut seen = HashSet::new();
    urls.retain(|url| seen.insert(url.trim_end_matches('/').to_ascii_lowercase()));
}
