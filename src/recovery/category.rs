//! Failure classification
//!
//! Categories are assigned from an ordered rule table. Structured signals
//! (error code, HTTP status) are checked across every rule before message
//! text is, so a 504 whose message says "timeout" is still a server error.

use crate::recovery::Failure;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

/// What kind of failure an operation hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    RateLimit,
    Auth,
    NotFound,
    ServerError,
    Parsing,
    Validation,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        Self::Network,
        Self::RateLimit,
        Self::Auth,
        Self::NotFound,
        Self::ServerError,
        Self::Parsing,
        Self::Validation,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::Parsing => "parsing",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification rule
struct Rule {
    category: ErrorCategory,
    /// Exact error codes, compared case-insensitively
    codes: &'static [&'static str],
    statuses: &'static [RangeInclusive<u16>],
    /// Lowercase message substrings
    messages: &'static [&'static str],
}

impl Rule {
    fn matches_signal(&self, failure: &Failure) -> bool {
        let code_hit = failure.code.as_deref().is_some_and(|code| {
            self.codes
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(code))
        });
        let status_hit = failure
            .status
            .is_some_and(|status| self.statuses.iter().any(|range| range.contains(&status)));
        code_hit || status_hit
    }

    fn matches_message(&self, message: &str) -> bool {
        self.messages.iter().any(|needle| message.contains(needle))
    }
}

const RATE_LIMIT: Rule = Rule {
    category: ErrorCategory::RateLimit,
    codes: &["RATE_LIMITED", "RATE_LIMIT_EXCEEDED", "TOO_MANY_REQUESTS"],
    statuses: &[429..=429],
    messages: &[
        "rate limit",
        "rate-limit",
        "ratelimit",
        "too many requests",
        "throttled",
        "quota exceeded",
    ],
};

/// Ordered rule table; the first matching rule wins
const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::Network,
        codes: &[
            "ECONNREFUSED",
            "ECONNRESET",
            "ECONNABORTED",
            "ETIMEDOUT",
            "ENOTFOUND",
            "EAI_AGAIN",
            "EHOSTUNREACH",
            "ENETUNREACH",
            "EPIPE",
        ],
        statuses: &[],
        messages: &[
            "timeout",
            "timed out",
            "connection refused",
            "connection reset",
            "network",
            "dns",
            "socket hang up",
            "getaddrinfo",
        ],
    },
    RATE_LIMIT,
    Rule {
        category: ErrorCategory::Auth,
        codes: &["UNAUTHORIZED", "FORBIDDEN", "AUTH_FAILED"],
        statuses: &[401..=401, 403..=403],
        messages: &[
            "unauthorized",
            "forbidden",
            "authentication",
            "invalid token",
            "token expired",
            "access denied",
        ],
    },
    Rule {
        category: ErrorCategory::NotFound,
        codes: &["NOT_FOUND"],
        statuses: &[404..=404, 410..=410],
        messages: &["not found", "no longer available"],
    },
    Rule {
        category: ErrorCategory::ServerError,
        codes: &["SERVER_ERROR"],
        statuses: &[500..=599],
        messages: &[
            "internal server error",
            "bad gateway",
            "service unavailable",
            "server error",
        ],
    },
    Rule {
        category: ErrorCategory::Parsing,
        codes: &["PARSE_ERROR"],
        statuses: &[],
        messages: &[
            "parse",
            "unexpected token",
            "invalid json",
            "syntax error",
            "malformed",
        ],
    },
    Rule {
        category: ErrorCategory::Validation,
        codes: &["VALIDATION_ERROR"],
        statuses: &[422..=422],
        messages: &["validation", "invalid", "required field"],
    },
];

/// Assigns a category to a failure
pub fn classify(failure: &Failure) -> ErrorCategory {
    if let Some(rule) = RULES.iter().find(|rule| rule.matches_signal(failure)) {
        return rule.category;
    }

    let message = failure.message.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches_message(&message))
        .map_or(ErrorCategory::Unknown, |rule| rule.category)
}

/// Whether a failure carries a rate-limit signal, whatever else it matches
pub(crate) fn is_rate_limit(failure: &Failure) -> bool {
    RATE_LIMIT.matches_signal(failure) || RATE_LIMIT.matches_message(&failure.message.to_lowercase())
}
