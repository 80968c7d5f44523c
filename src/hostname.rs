//! Host identity written into every record.

use crate::env::BANANAS_HOSTNAME_ENV;
use std::env;
use tracing::warn;

/// Resolve the host identity.
///
/// Tried in order: `BANANAS_HOSTNAME`, `HOSTNAME`, the system hostname,
/// then `"unknown"`. Empty values are skipped.
#[must_use]
pub fn get_hostname() -> String {
    for key in [BANANAS_HOSTNAME_ENV, "HOSTNAME"] {
        if let Ok(hostname) = env::var(key) {
            if !hostname.is_empty() {
                return hostname;
            }
        }
    }

    #[cfg(unix)]
    {
        match nix::unistd::gethostname() {
            Ok(hostname) => {
                if let Some(hostname) = hostname.to_str() {
                    if !hostname.is_empty() {
                        return hostname.to_string();
                    }
                }
            }
            Err(e) => warn!("failed to get system hostname: {}", e),
        }
    }

    warn!("could not determine hostname, using 'unknown'");
    "unknown".to_string()
}
