use crate::extract::text::{clean_text, element_text};
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("hardcoded selector is valid"));

static META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("hardcoded selector is valid"));

static CANONICAL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel='canonical'][href]").expect("hardcoded selector is valid")
});

/// Page-level metadata; absent fields are left out of serialized output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robots: Option<String>,
}

/// Reads title, description, keywords, author, Open Graph image and type,
/// canonical link and robots directive
///
/// The `<title>` tag wins over `og:title`, `meta[name=description]` over
/// `og:description`.
pub fn extract_meta(document: &Html) -> PageMeta {
    let title = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty());

    let canonical = document
        .select(&CANONICAL)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    PageMeta {
        title: title.or_else(|| meta_content(document, "property", "og:title")),
        description: meta_content(document, "name", "description")
            .or_else(|| meta_content(document, "property", "og:description")),
        keywords: meta_content(document, "name", "keywords"),
        author: meta_content(document, "name", "author"),
        og_image: meta_content(document, "property", "og:image"),
        og_type: meta_content(document, "property", "og:type"),
        canonical,
        robots: meta_content(document, "name", "robots"),
    }
}

/// Content of the first `<meta>` whose `attribute` equals `key`, ignoring case
fn meta_content(document: &Html, attribute: &str, key: &str) -> Option<String> {
    document
        .select(&META)
        .filter(|element| {
            element
                .value()
                .attr(attribute)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(key))
        })
        .filter_map(|element| element.value().attr("content"))
        .map(clean_text)
        .find(|content| !content.is_empty())
}
