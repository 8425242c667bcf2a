//! Rate ceilings and the lookup tables that choose one per identifier

use crate::config::ThrottleConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Which ceiling table an identifier is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// One shared budget
    Global,
    /// Per-domain budget (identifier is a host name)
    Domain,
    /// Per-external-service budget (identifier is a service name)
    Api,
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Domain => write!(f, "domain"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Request budget: at most `requests` admissions per `per_seconds`, and at
/// most `burst` admissions within any one second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCeiling {
    pub requests: u32,

    #[serde(rename = "per-seconds")]
    pub per_seconds: u64,

    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    10
}

impl RateCeiling {
    pub const fn new(requests: u32, per_seconds: u64, burst: u32) -> Self {
        Self {
            requests,
            per_seconds,
            burst,
        }
    }

    /// Length of the sliding window
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.per_seconds)
    }

    /// Even pacing between queued admissions (`window / requests`)
    pub fn spacing(&self) -> Duration {
        self.window() / self.requests.max(1)
    }

    /// Same ceiling with every field raised to at least 1
    pub fn clamped(&self) -> Self {
        Self {
            requests: self.requests.max(1),
            per_seconds: self.per_seconds.max(1),
            burst: self.burst.max(1),
        }
    }

    /// Same window and burst with a different request count
    pub fn with_requests(&self, requests: u32) -> Self {
        Self {
            requests: requests.max(1),
            ..*self
        }
    }
}

/// Built-in ceilings for external services the scraping pipeline talks to
const KNOWN_APIS: &[(&str, RateCeiling)] = &[
    ("apify", RateCeiling::new(30, 60, 5)),
    ("github", RateCeiling::new(5000, 3600, 20)),
    ("google-sheets", RateCeiling::new(60, 60, 10)),
    ("neon", RateCeiling::new(100, 60, 10)),
    ("openai", RateCeiling::new(60, 60, 5)),
];

/// Resolves the ceiling for an identifier of a given limit type
#[derive(Debug, Clone)]
pub struct CeilingTable {
    global: RateCeiling,
    domains: HashMap<String, RateCeiling>,
    apis: HashMap<String, RateCeiling>,
    /// Live ceilings set at runtime, keyed by the exact identifier
    overrides: HashMap<(LimitType, String), RateCeiling>,
}

impl CeilingTable {
    /// Builds the table from configuration; configured services override
    /// the built-in defaults
    pub fn from_config(config: &ThrottleConfig) -> Self {
        let mut apis: HashMap<String, RateCeiling> = KNOWN_APIS
            .iter()
            .map(|(name, ceiling)| (name.to_string(), *ceiling))
            .collect();

        for entry in &config.api {
            apis.insert(entry.service.trim().to_lowercase(), entry.ceiling);
        }

        let domains = config
            .domain
            .iter()
            .map(|entry| (normalize_domain(&entry.domain), entry.ceiling))
            .collect();

        Self {
            global: config.global,
            domains,
            apis,
            overrides: HashMap::new(),
        }
    }

    pub fn global(&self) -> RateCeiling {
        self.global
    }

    /// Services with their own ceiling, built-in or configured, sorted by name
    pub fn services(&self) -> Vec<(&str, RateCeiling)> {
        let mut services: Vec<(&str, RateCeiling)> = self
            .apis
            .iter()
            .map(|(name, ceiling)| (name.as_str(), *ceiling))
            .collect();
        services.sort_by(|a, b| a.0.cmp(b.0));
        services
    }

    /// Sets a live ceiling for one identifier; it wins over every table
    pub fn set_override(&mut self, identifier: &str, kind: LimitType, ceiling: RateCeiling) {
        self.overrides
            .insert((kind, identifier.to_string()), ceiling.clamped());
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    /// Looks up the ceiling for `identifier`
    ///
    /// Live overrides come first. Domains match their closest configured
    /// parent (`api.example.org` falls back to `example.org`). Anything
    /// without an entry uses the global ceiling.
    pub fn lookup(&self, identifier: &str, kind: LimitType) -> RateCeiling {
        if let Some(ceiling) = self.overrides.get(&(kind, identifier.to_string())) {
            return *ceiling;
        }

        match kind {
            LimitType::Global => self.global,
            LimitType::Domain => {
                let mut domain = normalize_domain(identifier);
                loop {
                    if let Some(ceiling) = self.domains.get(&domain) {
                        return *ceiling;
                    }
                    match domain.split_once('.') {
                        Some((_, parent)) if parent.contains('.') => domain = parent.to_string(),
                        _ => return self.global,
                    }
                }
            }
            LimitType::Api => self
                .apis
                .get(&identifier.trim().to_lowercase())
                .copied()
                .unwrap_or(self.global),
        }
    }
}

impl Default for CeilingTable {
    fn default() -> Self {
        Self::from_config(&ThrottleConfig::default())
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    domain
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(domain)
}
