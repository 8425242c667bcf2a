//! Caller-defined CSS selector extraction

use crate::extract::text::element_text;
use crate::SiftError;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

/// Compiles a CSS selector, reporting failures as `SiftError::InvalidSelector`
pub fn compile_selector(css: &str) -> Result<Selector, SiftError> {
    Selector::parse(css).map_err(|e| SiftError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// A compiled, named extraction rule
#[derive(Debug, Clone)]
pub enum SelectorSpec {
    /// Content of each matched element
    Content(Selector),
    /// One attribute of each matched element
    Attribute {
        selector: Selector,
        attribute: String,
    },
    /// An object per matched element, one key per sub-selector
    Fields {
        selector: Selector,
        fields: Vec<(String, Selector)>,
    },
}

impl SelectorSpec {
    pub fn content(css: &str) -> Result<Self, SiftError> {
        Ok(Self::Content(compile_selector(css)?))
    }

    /// Attribute extraction when `attribute` is set, otherwise per-element
    /// objects built from `fields` (or plain content when `fields` is empty)
    pub fn complex(
        css: &str,
        attribute: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Result<Self, SiftError> {
        let selector = compile_selector(css)?;

        if let Some(attribute) = attribute {
            return Ok(Self::Attribute {
                selector,
                attribute: attribute.to_string(),
            });
        }

        if fields.is_empty() {
            return Ok(Self::Content(selector));
        }

        let fields = fields
            .iter()
            .map(|(name, css)| Ok((name.to_string(), compile_selector(css)?)))
            .collect::<Result<Vec<_>, SiftError>>()?;
        Ok(Self::Fields { selector, fields })
    }

    fn selector(&self) -> &Selector {
        match self {
            Self::Content(selector)
            | Self::Attribute { selector, .. }
            | Self::Fields { selector, .. } => selector,
        }
    }

    /// Runs the rule against a document
    ///
    /// No match yields `None`, one match a single value and several an array.
    pub fn apply(&self, document: &Html) -> Option<Value> {
        let values: Vec<Value> = document
            .select(self.selector())
            .filter_map(|element| self.value_of(element))
            .collect();

        match values.len() {
            0 => None,
            1 => values.into_iter().next(),
            _ => Some(Value::Array(values)),
        }
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<Value> {
        match self {
            Self::Content(_) => Some(element_content(element)),
            Self::Attribute { attribute, .. } => element
                .value()
                .attr(attribute)
                .map(|value| Value::String(value.trim().to_string())),
            Self::Fields { fields, .. } => {
                let object: Map<String, Value> = fields
                    .iter()
                    .filter_map(|(name, selector)| {
                        element
                            .select(selector)
                            .next()
                            .map(|found| (name.clone(), element_content(found)))
                    })
                    .collect();
                Some(Value::Object(object))
            }
        }
    }
}

/// Type-aware content of an element
///
/// | Element | Value |
/// |---------|-------|
/// | `img` | `{src, alt, title}` |
/// | `a` | `{href, text, title}` |
/// | `meta` | the `content` attribute |
/// | anything else | cleaned text |
pub fn element_content(element: ElementRef<'_>) -> Value {
    let el = element.value();
    let text = || element_text(element);

    match el.name() {
        "img" => json!({
            "src": el.attr("src"),
            "alt": el.attr("alt"),
            "title": el.attr("title"),
        }),
        "a" => json!({
            "href": el.attr("href"),
            "text": text(),
            "title": el.attr("title"),
        }),
        "meta" => Value::String(el.attr("content").unwrap_or_default().trim().to_string()),
        _ => Value::String(text()),
    }
}
