use crate::env::{
    split_list, BANANAS_ENDPOINT_ENV, BANANAS_EXCLUDE_ENV, BANANAS_INTERVAL_MSEC_ENV,
    BANANAS_SIGNALS_ENV, BANANAS_STOP_TIMEOUT_MSEC_ENV, BANANAS_TAGS_ENV, BANANAS_TOKEN_ENV,
    BANANAS_UNCAUGHT_EXCEPTION_ENV,
};
use crate::error::{BoxError, ConfigError};
use crate::host::RequestContext;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default ingestion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://logs-01.loggly.com";

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Host-supplied function that turns an authenticated request into the
/// `auth` value of a record. Errors propagate to the event's caller.
pub type CredentialExtractor =
    Arc<dyn Fn(&RequestContext) -> Result<Value, BoxError> + Send + Sync>;

/// Engine configuration. Read-only once the engine is started.
///
/// **Fields**
/// - `token`: Loggly customer token, must be non-empty.
/// - `endpoint`: ingestion base URL; batches go to `<endpoint>/bulk/<token>`.
/// - `interval`: period of the flush timer.
/// - `exclude`: exact request paths that never produce response records.
/// - `uncaught_exception`: install the panic hook and report failed
///   watched tasks.
/// - `signals`: listen for SIGTERM and SIGINT.
/// - `stop_timeout`: bound passed to [`Host::stop`](crate::host::Host::stop)
///   on signal-triggered shutdown, also bounds the fatal flush.
/// - `tags`: global tags prepended to every record's own tags.
/// - `credentials`: optional [`CredentialExtractor`].
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub endpoint: String,
    pub interval: Duration,
    pub exclude: Vec<String>,
    pub uncaught_exception: bool,
    pub signals: bool,
    pub stop_timeout: Duration,
    pub tags: Option<Vec<String>>,
    pub credentials: Option<CredentialExtractor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interval: DEFAULT_INTERVAL,
            exclude: Vec::new(),
            uncaught_exception: false,
            signals: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            tags: None,
            credentials: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("interval", &self.interval)
            .field("exclude", &self.exclude)
            .field("uncaught_exception", &self.uncaught_exception)
            .field("signals", &self.signals)
            .field("stop_timeout", &self.stop_timeout)
            .field("tags", &self.tags)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_exclude<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.exclude = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_uncaught_exception(mut self, enabled: bool) -> Self {
        self.uncaught_exception = enabled;
        self
    }

    pub fn with_signals(mut self, enabled: bool) -> Self {
        self.signals = enabled;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set global tags. An empty list is treated as no tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = if tags.is_empty() { None } else { Some(tags) };
        self
    }

    pub fn with_credentials<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.credentials = Some(Arc::new(extractor));
        self
    }

    /// Check the settings an engine cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    /// Bulk ingestion URI for this token.
    pub fn uri(&self) -> String {
        format!(
            "{}/bulk/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.token)
        )
    }

    pub fn global_tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|p| p == path)
    }

    /// Build a configuration from `BANANAS_*` environment variables.
    /// Unset variables keep their defaults; the token is not validated here.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(token) = lookup(BANANAS_TOKEN_ENV) {
            config.token = token;
        }
        if let Some(endpoint) = lookup(BANANAS_ENDPOINT_ENV) {
            config.endpoint = endpoint;
        }
        if let Some(raw) = lookup(BANANAS_INTERVAL_MSEC_ENV) {
            config.interval = parse_millis(BANANAS_INTERVAL_MSEC_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BANANAS_EXCLUDE_ENV) {
            config.exclude = split_list(&raw);
        }
        if let Some(raw) = lookup(BANANAS_UNCAUGHT_EXCEPTION_ENV) {
            config.uncaught_exception = parse_bool(BANANAS_UNCAUGHT_EXCEPTION_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BANANAS_SIGNALS_ENV) {
            config.signals = parse_bool(BANANAS_SIGNALS_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BANANAS_STOP_TIMEOUT_MSEC_ENV) {
            config.stop_timeout = parse_millis(BANANAS_STOP_TIMEOUT_MSEC_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BANANAS_TAGS_ENV) {
            config = config.with_tags(split_list(&raw));
        }

        Ok(config)
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidEnv {
            key,
            value: raw.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key,
            value: raw.to_string(),
        }),
    }
}
