//! Environment variable names recognized by
//! [`Config::from_env`](crate::config::Config::from_env).
//!
//! These are purely helpers; the engine itself never reads the
//! environment for configuration after construction.

/// Loggly customer token (required).
pub const BANANAS_TOKEN_ENV: &str = "BANANAS_TOKEN";

/// Ingestion base URL, e.g. `https://logs-01.loggly.com`.
pub const BANANAS_ENDPOINT_ENV: &str = "BANANAS_ENDPOINT";

/// Flush interval in milliseconds.
pub const BANANAS_INTERVAL_MSEC_ENV: &str = "BANANAS_INTERVAL_MSEC";

/// Comma-separated list of request paths that never produce response records.
pub const BANANAS_EXCLUDE_ENV: &str = "BANANAS_EXCLUDE";

/// `true`/`false`: install the panic hook.
pub const BANANAS_UNCAUGHT_EXCEPTION_ENV: &str = "BANANAS_UNCAUGHT_EXCEPTION";

/// `true`/`false`: listen for SIGTERM and SIGINT.
pub const BANANAS_SIGNALS_ENV: &str = "BANANAS_SIGNALS";

/// Host stop timeout in milliseconds, used on signal-triggered shutdown.
pub const BANANAS_STOP_TIMEOUT_MSEC_ENV: &str = "BANANAS_STOP_TIMEOUT_MSEC";

/// Comma-separated global tags.
pub const BANANAS_TAGS_ENV: &str = "BANANAS_TAGS";

/// Overrides the host identity written into every record.
pub const BANANAS_HOSTNAME_ENV: &str = "BANANAS_HOSTNAME";

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
