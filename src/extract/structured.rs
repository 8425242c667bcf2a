//! JSON-LD and microdata extraction

use crate::extract::text::element_text;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("hardcoded selector is valid")
});

static ITEM_SCOPE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[itemscope][itemtype]").expect("hardcoded selector is valid")
});

static ITEM_PROP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop]").expect("hardcoded selector is valid"));

/// Type used for items that do not declare one
const UNTYPED: &str = "Thing";

/// Structured data grouped by declared type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredData {
    #[serde(rename = "jsonLd")]
    pub json_ld: BTreeMap<String, Vec<Value>>,
    pub microdata: BTreeMap<String, Vec<Value>>,
}

impl StructuredData {
    pub fn is_empty(&self) -> bool {
        self.json_ld.is_empty() && self.microdata.is_empty()
    }
}

/// Parses every JSON-LD script block; blocks that are not valid JSON are skipped
pub fn json_ld_blocks(document: &Html) -> Vec<Value> {
    document
        .select(&JSON_LD)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Skipping invalid JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Collects JSON-LD items (flattening arrays and `@graph`) and microdata
/// items, each grouped by type
pub fn extract_structured(document: &Html) -> StructuredData {
    let mut json_ld: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for block in json_ld_blocks(document) {
        for item in flatten_json_ld(block) {
            json_ld.entry(json_ld_type(&item)).or_default().push(item);
        }
    }

    let mut microdata: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for scope in document.select(&ITEM_SCOPE) {
        // Nested items are reported inside their parent
        if scope.value().attr("itemprop").is_some() {
            continue;
        }
        let (kind, item) = microdata_item(scope);
        microdata.entry(kind).or_default().push(item);
    }

    StructuredData { json_ld, microdata }
}

fn flatten_json_ld(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(flatten_json_ld).collect(),
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten_json_ld(graph),
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    }
}

fn json_ld_type(item: &Value) -> String {
    match item.get("@type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .find_map(Value::as_str)
            .unwrap_or(UNTYPED)
            .to_string(),
        _ => UNTYPED.to_string(),
    }
}

/// Short type name of a microdata item (`https://schema.org/Organization`
/// becomes `Organization`)
fn microdata_type(scope: ElementRef<'_>) -> String {
    scope
        .value()
        .attr("itemtype")
        .and_then(|itemtype| itemtype.split_whitespace().next())
        .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNTYPED)
        .to_string()
}

fn microdata_item(scope: ElementRef<'_>) -> (String, Value) {
    let kind = microdata_type(scope);
    let mut properties = Map::new();
    properties.insert("@type".to_string(), Value::String(kind.clone()));

    for element in scope.select(&ITEM_PROP) {
        if owning_scope(element).map(|owner| owner.id()) != Some(scope.id()) {
            continue;
        }

        let value = if element.value().attr("itemscope").is_some() {
            microdata_item(element).1
        } else {
            Value::String(microdata_value(element))
        };

        for name in element.value().attr("itemprop").unwrap_or_default().split_whitespace() {
            match properties.get_mut(name) {
                Some(Value::Array(values)) => values.push(value.clone()),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value.clone()]);
                }
                None => {
                    properties.insert(name.to_string(), value.clone());
                }
            }
        }
    }

    (kind, Value::Object(properties))
}

/// Nearest ancestor carrying `itemscope`
fn owning_scope(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().attr("itemscope").is_some())
}

/// Value of a microdata property per element type
fn microdata_value(element: ElementRef<'_>) -> String {
    let attr = |name: &str| element.value().attr(name).map(|v| v.trim().to_string());
    let value = match element.value().name() {
        "meta" => attr("content"),
        "a" | "link" | "area" => attr("href"),
        "img" | "audio" | "video" | "source" | "iframe" | "embed" => attr("src"),
        "object" => attr("data"),
        "time" => attr("datetime"),
        "data" | "meter" => attr("value"),
        _ => None,
    };
    value.unwrap_or_else(|| element_text(element))
}
