// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_INDEX, DEFAULT_MAX_EVENTS_PER_REQUEST, DEFAULT_READ_TIMEOUT,
    DEFAULT_SOURCE, DEFAULT_SOURCETYPE, HEC_EVENT_PATH, MAX_TOTAL_BACKOFF,
};
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::transformer::EventTags;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Where the collector token comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Token given literally in the environment.
    Static(String),
    /// Secrets Manager secret whose `SecretString` is the token.
    SecretArn(String),
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => write!(f, "Static(<redacted>)"),
            Self::SecretArn(arn) => write!(f, "SecretArn({arn})"),
        }
    }
}

/// Forwarder configuration, read once at process start.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Collector base URL, without trailing slash.
    pub hec_url: String,
    pub token_source: TokenSource,
    pub verify_tls: bool,
    /// Extra PEM root certificates trusted by the HTTP client.
    pub ca_bundle_path: Option<PathBuf>,
    pub index: Option<String>,
    pub source: Option<String>,
    pub sourcetype: String,
    pub include_event_id: bool,
    pub max_events_per_request: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
    pub https_proxy: Option<String>,
    pub log_level: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            hec_url: String::new(),
            token_source: TokenSource::Static(String::new()),
            verify_tls: true,
            ca_bundle_path: None,
            index: Some(DEFAULT_INDEX.to_string()),
            source: Some(DEFAULT_SOURCE.to_string()),
            sourcetype: DEFAULT_SOURCETYPE.to_string(),
            include_event_id: false,
            max_events_per_request: DEFAULT_MAX_EVENTS_PER_REQUEST,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry: RetryPolicy::default(),
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

impl ForwarderConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let hec_url = lookup("SPLUNK_HEC_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("SPLUNK_HEC_URL"))?;

        let token_source = match (
            non_empty(lookup("SPLUNK_HEC_TOKEN")),
            non_empty(lookup("SPLUNK_HEC_TOKEN_SECRET_ARN")),
        ) {
            (Some(token), _) => TokenSource::Static(token),
            (None, Some(arn)) => TokenSource::SecretArn(arn),
            (None, None) => return Err(ConfigError::Missing("SPLUNK_HEC_TOKEN_SECRET_ARN")),
        };

        // Unset means the default; set-but-empty means "omit the tag".
        let index = lookup("SPLUNK_INDEX").map_or(defaults.index, |v| non_empty(Some(v)));
        let source = lookup("SPLUNK_SOURCE").map_or(defaults.source, |v| non_empty(Some(v)));
        let sourcetype =
            non_empty(lookup("SPLUNK_SOURCETYPE")).unwrap_or(defaults.sourcetype);

        let retry = RetryPolicy {
            max_attempts: parse_or("HEC_MAX_ATTEMPTS", &lookup, defaults.retry.max_attempts)?,
            initial_backoff: millis_or(
                "HEC_INITIAL_BACKOFF_MS",
                &lookup,
                defaults.retry.initial_backoff,
            )?,
            max_backoff: millis_or("HEC_MAX_BACKOFF_MS", &lookup, defaults.retry.max_backoff)?,
        };

        let config = Self {
            hec_url,
            token_source,
            verify_tls: bool_or("VERIFY_TLS", &lookup, defaults.verify_tls)?,
            ca_bundle_path: non_empty(lookup("CA_BUNDLE_PATH")).map(PathBuf::from),
            index,
            source,
            sourcetype,
            include_event_id: bool_or("HEC_INCLUDE_EVENT_ID", &lookup, defaults.include_event_id)?,
            max_events_per_request: parse_or(
                "HEC_MAX_EVENTS_PER_REQUEST",
                &lookup,
                defaults.max_events_per_request,
            )?,
            connect_timeout: secs_or("HEC_CONNECT_TIMEOUT_SECS", &lookup, defaults.connect_timeout)?,
            read_timeout: secs_or("HEC_READ_TIMEOUT_SECS", &lookup, defaults.read_timeout)?,
            retry,
            https_proxy: non_empty(lookup("HEC_PROXY_HTTPS"))
                .or_else(|| non_empty(lookup("HTTPS_PROXY"))),
            log_level: non_empty(lookup("LOG_LEVEL"))
                .map_or(defaults.log_level, |level| level.to_lowercase()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hec_url.trim().is_empty() {
            return Err(ConfigError::Missing("SPLUNK_HEC_URL"));
        }
        match reqwest::Url::parse(&self.hec_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(invalid(
                    "SPLUNK_HEC_URL",
                    format!("unsupported scheme '{}'", url.scheme()),
                ))
            }
            Err(e) => return Err(invalid("SPLUNK_HEC_URL", e.to_string())),
        }

        match &self.token_source {
            TokenSource::Static(token) if token.trim().is_empty() => {
                return Err(ConfigError::Missing("SPLUNK_HEC_TOKEN"));
            }
            TokenSource::SecretArn(arn) if arn.trim().is_empty() => {
                return Err(ConfigError::Missing("SPLUNK_HEC_TOKEN_SECRET_ARN"));
            }
            _ => {}
        }

        if self.max_events_per_request == 0 {
            return Err(invalid(
                "HEC_MAX_EVENTS_PER_REQUEST",
                "must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(invalid(
                "HEC_CONNECT_TIMEOUT_SECS",
                "must be greater than 0".to_string(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(invalid(
                "HEC_READ_TIMEOUT_SECS",
                "must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("HEC_MAX_ATTEMPTS", "must be at least 1".to_string()));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(invalid(
                "HEC_INITIAL_BACKOFF_MS",
                "must not exceed HEC_MAX_BACKOFF_MS".to_string(),
            ));
        }
        let total = self.retry.total_backoff();
        if total > MAX_TOTAL_BACKOFF {
            return Err(invalid(
                "HEC_MAX_ATTEMPTS",
                format!(
                    "retry schedule sleeps {}ms in total, limit is {}ms",
                    total.as_millis(),
                    MAX_TOTAL_BACKOFF.as_millis()
                ),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid(
                "LOG_LEVEL",
                format!(
                    "'{}' must be one of: trace, debug, info, warn, error",
                    self.log_level
                ),
            ));
        }

        Ok(())
    }

    /// Full event endpoint. A URL that already names the event path is used
    /// as is.
    #[must_use]
    pub fn hec_endpoint(&self) -> String {
        if self.hec_url.ends_with(HEC_EVENT_PATH) {
            self.hec_url.clone()
        } else {
            format!("{}{HEC_EVENT_PATH}", self.hec_url)
        }
    }

    #[must_use]
    pub fn event_tags(&self) -> EventTags {
        EventTags {
            source: self.source.clone(),
            sourcetype: self.sourcetype.clone(),
            index: self.index.clone(),
            include_event_id: self.include_event_id,
        }
    }
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { name, reason }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(name)) {
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(name, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

fn bool_or<F>(name: &'static str, lookup: &F, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(name)).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(invalid(name, format!("'{v}' is not a boolean"))),
        None => Ok(default),
    }
}

fn secs_or<F>(name: &'static str, lookup: &F, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(name, lookup, default.as_secs()).map(Duration::from_secs)
}

fn millis_or<F>(
    name: &'static str,
    lookup: &F,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(name, lookup, default_ms).map(Duration::from_millis)
}
