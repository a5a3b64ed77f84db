//! Orchestrator configuration.

use std::time::Duration;

use tracing::warn;

/// Upper bound on concurrent storage calls (unset or 0 = unbounded).
pub const ENV_MAX_IN_FLIGHT: &str = "ACQORDERS_MAX_IN_FLIGHT";
/// Per-request transport timeout in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ACQORDERS_REQUEST_TIMEOUT_SECS";
/// Page size of the line query.
pub const ENV_LINE_QUERY_LIMIT: &str = "ACQORDERS_LINE_QUERY_LIMIT";
/// Language used when the request context carries none.
pub const ENV_DEFAULT_LANG: &str = "ACQORDERS_DEFAULT_LANG";

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum storage calls in flight across one orchestrator (`None` = unbounded).
    pub max_in_flight: Option<usize>,
    /// Transport timeout for a single storage call.
    pub request_timeout: Duration,
    /// `limit` of the query fetching an order's lines.
    pub line_query_limit: u32,
    /// Default `lang` query parameter.
    pub default_lang: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            request_timeout: Duration::from_secs(30),
            line_query_limit: 999,
            default_lang: "en".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; malformed values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_in_flight = parse_or(&lookup, ENV_MAX_IN_FLIGHT, 0usize);
        let timeout_secs = parse_or(
            &lookup,
            ENV_REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        );
        let line_query_limit = parse_or(&lookup, ENV_LINE_QUERY_LIMIT, defaults.line_query_limit);
        let default_lang = lookup(ENV_DEFAULT_LANG)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.default_lang);

        Self {
            max_in_flight: None,
            request_timeout: Duration::from_secs(timeout_secs),
            line_query_limit,
            default_lang,
        }
        .with_max_in_flight(max_in_flight)
    }

    /// Bound concurrent storage calls; 0 removes the bound.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = (max > 0).then_some(max);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_line_query_limit(mut self, limit: u32) -> Self {
        self.line_query_limit = limit;
        self
    }

    pub fn with_default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = lang.into();
        self
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: core::str::FromStr + Copy + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "ignoring malformed configuration value");
            default
        }),
    }
}
