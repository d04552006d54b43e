//! Session configuration.
//!
//! Defaults mirror the addresses the store app has always tried: the LAN
//! host first, then the two loopback spellings.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_CANDIDATES: [&str; 3] = [
    "http://192.168.0.12:8000/api",
    "http://localhost:8000/api",
    "http://127.0.0.1:8000/api",
];

pub const DEFAULT_PROBE_RESOURCE: &str = "products";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Shorter probe used by forms that only need to know where to POST.
pub const QUICK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_API_URLS: &str = "STOREFRONT_API_URLS";
pub const ENV_PROBE_RESOURCE: &str = "STOREFRONT_PROBE_RESOURCE";
pub const ENV_PROBE_TIMEOUT_MS: &str = "STOREFRONT_PROBE_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "STOREFRONT_REQUEST_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one candidate API URL is required")]
    NoCandidates,
    #[error("invalid candidate URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("timeouts must be greater than zero")]
    ZeroTimeout,
}

/// Ordered candidate base URLs plus the timeouts applied to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    candidates: Vec<String>,
    probe_resource: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            probe_resource: DEFAULT_PROBE_RESOURCE.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Build a config from an ordered candidate list (tried first to last).
    pub fn new<I, S>(candidates: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates = candidates
            .into_iter()
            .map(|c| normalize_candidate(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }

        Ok(Self { candidates, ..Self::default() })
    }

    /// Replace the candidate list, keeping the probe resource and timeouts.
    pub fn with_candidates<I, S>(self, candidates: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates = Self::new(candidates)?.candidates;
        Ok(Self { candidates, ..self })
    }

    pub fn with_probe_resource(mut self, resource: impl Into<String>) -> Self {
        self.probe_resource = resource.into().trim_matches('/').to_string();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read overrides from `STOREFRONT_*` environment variables; anything
    /// unset keeps its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(ENV_API_URLS) {
            Some(urls) => Self::new(urls.split(',').map(str::trim).filter(|s| !s.is_empty()))?,
            None => Self::default(),
        };

        if let Some(resource) = lookup(ENV_PROBE_RESOURCE) {
            config = config.with_probe_resource(resource);
        }
        if let Some(ms) = lookup(ENV_PROBE_TIMEOUT_MS) {
            config = config.with_probe_timeout(parse_millis(ENV_PROBE_TIMEOUT_MS, &ms)?);
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config = config.with_request_timeout(parse_millis(ENV_REQUEST_TIMEOUT_MS, &ms)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would allow an unbounded or zero wait.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        if self.probe_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn probe_resource(&self) -> &str {
        &self.probe_resource
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn normalize_candidate(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue { var, value: value.to_string() })
}
