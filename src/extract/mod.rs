//! HTML data extraction
//!
//! Turns an already-fetched HTML page into an `ExtractedRecord`: page
//! metadata, contact details (emails, phones, addresses), social profile
//! links, structured data, plus whatever caller-defined selectors and
//! extractors ask for. Extraction never fails and never touches the
//! network; identical input always yields an identical record.
//!
//! # Example
//!
//! ```
//! use sumi_sift::extract::{extract_from_html, ExtractOptions};
//!
//! let html = r#"<a href="mailto:hello@acme.io">Mail</a><p>Call (555) 123-4567</p>"#;
//! let record = extract_from_html(html, &ExtractOptions::default());
//! assert_eq!(record.contacts.emails, vec!["hello@acme.io"]);
//! assert_eq!(record.contacts.phones, vec!["(555) 123-4567"]);
//! ```

mod addresses;
mod emails;
mod meta;
mod phones;
mod selectors;
mod social;
mod structured;
mod text;

pub use addresses::{extract_addresses, find_postal_code, Address};
pub use emails::{deobfuscate, extract_emails, is_valid_email, validate_email, PLACEHOLDER_DOMAINS};
pub use meta::{extract_meta, PageMeta};
pub use phones::{clean_phone, extract_phones, is_valid_phone};
pub use selectors::{compile_selector, element_content, SelectorSpec};
pub use social::{classify_profile_url, extract_social, SocialPlatform};
pub use structured::{extract_structured, json_ld_blocks, StructuredData};
pub use text::{clean_text, element_text, visible_text};

use crate::config::{Config, ExtractorConfig};
use crate::SiftError;
use scraper::Html;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Caller-supplied extraction over the parsed document and raw HTML
pub type CustomExtractor = Box<dyn Fn(&Html, &str) -> Value + Send + Sync>;

/// Contact details found on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contacts {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<Address>,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedRecord {
    pub meta: PageMeta,
    pub contacts: Contacts,
    pub social: BTreeMap<SocialPlatform, Vec<String>>,
    pub structured: StructuredData,
    /// Results of named selectors, by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selected: BTreeMap<String, Value>,
    /// Results of custom extractors, by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
}

/// Truncation limits applied by the final cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_emails: Option<usize>,
    pub max_phones: Option<usize>,
    pub max_social_per_platform: Option<usize>,
}

impl ExtractLimits {
    /// Fields set here win; unset ones fall back to `defaults`
    pub fn or(self, defaults: ExtractLimits) -> ExtractLimits {
        ExtractLimits {
            max_emails: self.max_emails.or(defaults.max_emails),
            max_phones: self.max_phones.or(defaults.max_phones),
            max_social_per_platform: self
                .max_social_per_platform
                .or(defaults.max_social_per_platform),
        }
    }
}

impl From<&ExtractorConfig> for ExtractLimits {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            max_emails: config.max_emails,
            max_phones: config.max_phones,
            max_social_per_platform: config.max_social_per_platform,
        }
    }
}

/// Per-call extraction options
///
/// Selectors are compiled as they are added, so a bad selector is reported
/// here and extraction itself cannot fail.
#[derive(Default)]
pub struct ExtractOptions {
    selectors: Vec<(String, SelectorSpec)>,
    custom_extractors: Vec<(String, CustomExtractor)>,
    pub limits: ExtractLimits,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named content selector
    pub fn add_selector(mut self, name: &str, css: &str) -> Result<Self, SiftError> {
        self.selectors
            .push((name.to_string(), SelectorSpec::content(css)?));
        Ok(self)
    }

    /// Adds a named attribute or multi-field selector
    pub fn add_complex(
        mut self,
        name: &str,
        css: &str,
        attribute: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Result<Self, SiftError> {
        self.selectors.push((
            name.to_string(),
            SelectorSpec::complex(css, attribute, fields)?,
        ));
        Ok(self)
    }

    pub fn add_extractor<F>(mut self, name: &str, extractor: F) -> Self
    where
        F: Fn(&Html, &str) -> Value + Send + Sync + 'static,
    {
        self.custom_extractors
            .push((name.to_string(), Box::new(extractor)));
        self
    }

    pub fn with_limits(mut self, limits: ExtractLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors: Vec<&str> = self.selectors.iter().map(|(n, _)| n.as_str()).collect();
        let custom: Vec<&str> = self
            .custom_extractors
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        f.debug_struct("ExtractOptions")
            .field("selectors", &selectors)
            .field("custom_extractors", &custom)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Extractor with configured placeholder domains and default limits
#[derive(Debug, Clone, Default)]
pub struct DataExtractor {
    placeholder_domains: Vec<String>,
    limits: ExtractLimits,
}

impl DataExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            placeholder_domains: config.placeholder_domains.clone(),
            limits: ExtractLimits::from(config),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.extractor)
    }

    /// Runs every extraction pass over `html`
    pub fn extract_from_html(&self, html: &str, options: &ExtractOptions) -> ExtractedRecord {
        let document = Html::parse_document(html);
        let text = visible_text(&document);

        let selected = options
            .selectors
            .iter()
            .filter_map(|(name, spec)| spec.apply(&document).map(|value| (name.clone(), value)))
            .collect();

        let custom = options
            .custom_extractors
            .iter()
            .map(|(name, extractor)| (name.clone(), extractor(&document, html)))
            .collect();

        let record = ExtractedRecord {
            meta: extract_meta(&document),
            contacts: Contacts {
                emails: extract_emails(&document, html, &self.placeholder_domains),
                phones: extract_phones(&document, &text),
                addresses: extract_addresses(&document, &text),
            },
            social: extract_social(&document, html),
            structured: extract_structured(&document),
            selected,
            custom,
        };

        let record = finalize(record, options.limits.or(self.limits));
        tracing::debug!(
            "Extracted {} emails, {} phones, {} addresses, {} social platforms",
            record.contacts.emails.len(),
            record.contacts.phones.len(),
            record.contacts.addresses.len(),
            record.social.len()
        );
        record
    }
}

/// Extracts with the built-in placeholder list and no default limits
pub fn extract_from_html(html: &str, options: &ExtractOptions) -> ExtractedRecord {
    DataExtractor::default().extract_from_html(html, options)
}

/// Final cleaning pass: de-duplicates contact and social lists and applies
/// truncation limits
fn finalize(mut record: ExtractedRecord, limits: ExtractLimits) -> ExtractedRecord {
    let contacts = &mut record.contacts;
    contacts.emails = emails::dedup_emails(std::mem::take(&mut contacts.emails));
    contacts.phones = phones::dedup_phones(std::mem::take(&mut contacts.phones));

    if let Some(max) = limits.max_emails {
        contacts.emails.truncate(max);
    }
    if let Some(max) = limits.max_phones {
        contacts.phones.truncate(max);
    }

    for urls in record.social.values_mut() {
        social::dedup_urls(urls);
        if let Some(max) = limits.max_social_per_platform {
            urls.truncate(max);
        }
    }
    record.social.retain(|_, urls| !urls.is_empty());

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COMPANY_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Acme Anvils | Contact</title>
    <meta name="description" content="Anvils for every occasion">
    <script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "Organization", "name": "Acme Anvils",
         "email": "orders@acme-anvils.com", "telephone": "+1-555-010-9999"}
    </script>
</head>
<body>
    <h1>Contact Acme</h1>
    <p>Email <a href="mailto:info@acme-anvils.com">info@acme-anvils.com</a>
       or support [at] acme-anvils [dot] com.</p>
    <p>Phone: (555) 123-4567 / 555.123.4567 / 555-987-6543</p>
    <p>Visit 42 Canyon Road, Tucson, AZ 85701</p>
    <a href="https://www.linkedin.com/company/acme-anvils">LinkedIn</a>
    <a href="https://twitter.com/acmeanvils">Twitter</a>
    <a href="https://twitter.com/share?url=acme">Tweet this</a>
</body>
</html>"#;

    #[test]
    fn test_full_record() {
        let record = extract_from_html(COMPANY_PAGE, &ExtractOptions::default());

        assert_eq!(record.meta.title.as_deref(), Some("Acme Anvils | Contact"));
        assert_eq!(
            record.contacts.emails,
            vec![
                "orders@acme-anvils.com",
                "info@acme-anvils.com",
                "support@acme-anvils.com"
            ]
        );
        assert_eq!(
            record.contacts.phones,
            vec!["(555) 123-4567", "(555) 987-6543"]
        );
        assert_eq!(
            record.contacts.addresses[0].street.as_deref(),
            Some("42 Canyon Road")
        );
        assert_eq!(record.contacts.addresses[0].zip.as_deref(), Some("85701"));
        assert_eq!(
            record.social[&SocialPlatform::LinkedinCompany],
            vec!["https://www.linkedin.com/company/acme-anvils"]
        );
        assert_eq!(
            record.social[&SocialPlatform::Twitter],
            vec!["https://twitter.com/acmeanvils"]
        );
        assert_eq!(record.structured.json_ld["Organization"].len(), 1);
        assert!(record.selected.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let options = ExtractOptions::new().add_selector("heading", "h1").unwrap();

        let first = serde_json::to_string(&extract_from_html(COMPANY_PAGE, &options)).unwrap();
        let second = serde_json::to_string(&extract_from_html(COMPANY_PAGE, &options)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_selectors_and_custom_extractors() {
        let options = ExtractOptions::new()
            .add_selector("heading", "h1")
            .unwrap()
            .add_complex("profiles", "a[href*='linkedin']", Some("href"), &[])
            .unwrap()
            .add_selector("absent", ".nothing")
            .unwrap()
            .add_extractor("length", |_document, html| json!(html.len()));

        let record = extract_from_html(COMPANY_PAGE, &options);

        assert_eq!(record.selected["heading"], json!("Contact Acme"));
        assert_eq!(
            record.selected["profiles"],
            json!("https://www.linkedin.com/company/acme-anvils")
        );
        assert!(!record.selected.contains_key("absent"));
        assert_eq!(record.custom["length"], json!(COMPANY_PAGE.len()));
    }

    #[test]
    fn test_limits_truncate() {
        let options = ExtractOptions::new().with_limits(ExtractLimits {
            max_emails: Some(1),
            max_phones: Some(1),
            max_social_per_platform: None,
        });

        let record = extract_from_html(COMPANY_PAGE, &options);

        assert_eq!(record.contacts.emails, vec!["orders@acme-anvils.com"]);
        assert_eq!(record.contacts.phones, vec!["(555) 123-4567"]);
    }

    #[test]
    fn test_configured_extractor() {
        let config = ExtractorConfig {
            max_emails: Some(2),
            placeholder_domains: vec!["acme-anvils.com".to_string()],
            ..ExtractorConfig::default()
        };
        let extractor = DataExtractor::new(&config);

        let record = extractor.extract_from_html(COMPANY_PAGE, &ExtractOptions::default());
        assert!(record.contacts.emails.is_empty());

        let limits = ExtractLimits::default().or(ExtractLimits::from(&config));
        assert_eq!(limits.max_emails, Some(2));
    }

    #[test]
    fn test_invalid_selector_reported_when_added() {
        let result = ExtractOptions::new().add_selector("bad", "p[");
        assert!(matches!(result, Err(SiftError::InvalidSelector { .. })));
    }

    #[test]
    fn test_empty_page() {
        let record = extract_from_html("", &ExtractOptions::default());
        assert_eq!(record, ExtractedRecord::default());
    }
}
