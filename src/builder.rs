//! Turns host events into [`Record`]s.

use crate::config::Config;
use crate::error::Error;
use crate::host::RequestContext;
use crate::hostname::get_hostname;
use crate::record::{EventKind, Record, RequestDetail, RequestInfo};
use chrono::Utc;
use std::collections::BTreeMap;

/// Tag every lifecycle record carries after the global tags.
pub const BANANAS_TAG: &str = "bananas";

/// Record with only the envelope filled in: kind, timestamp, host.
pub fn envelope(kind: EventKind) -> Record {
    Record {
        event: kind,
        timestamp: Utc::now().timestamp_millis(),
        host: get_hostname(),
        tags: Vec::new(),
        request: None,
        auth: None,
        error: None,
        data: None,
        code: None,
        env: None,
    }
}

/// Build a record for `kind`, with request detail when `request` is given.
///
/// `auth` is filled only for authenticated requests when a credential
/// extractor is configured. Extractor errors are returned as
/// [`Error::Credentials`] and no record is produced.
pub fn build(
    kind: EventKind,
    request: Option<&RequestContext>,
    config: &Config,
) -> Result<Record, Error> {
    let mut record = envelope(kind);

    if let Some(ctx) = request {
        record.request = Some(RequestDetail {
            path: ctx.path.clone(),
            query: ctx.query.clone(),
            params: ctx.params.clone(),
            route_path: ctx.route_path.clone(),
            method: ctx.method.clone(),
            request: RequestInfo {
                id: ctx.id.clone(),
                received: ctx.received,
                elapsed: record.timestamp.saturating_sub(ctx.received),
                remote_ip: ctx.remote_ip.clone(),
            },
        });

        if ctx.authenticated {
            if let Some(extractor) = &config.credentials {
                record.auth = Some(extractor(ctx).map_err(Error::Credentials)?);
            }
        }
    }

    Ok(record)
}

/// Snapshot of the process environment. Non-UTF-8 entries are converted
/// lossily.
pub fn env_snapshot() -> BTreeMap<String, String> {
    std::env::vars_os()
        .map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        })
        .collect()
}
