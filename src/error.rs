use std::error::Error as StdError;

/// Error type used at the transport and credential-extractor seams.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Error returned when a [`Config`](crate::config::Config) cannot be used
/// to start an engine.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing Loggly API token")]
    MissingToken,

    #[error("flush interval must be greater than zero")]
    InvalidInterval,

    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Engine-level error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The host-supplied credential extractor failed while a record was
    /// being built. The record is not enqueued.
    #[error("credential extractor failed: {0}")]
    Credentials(#[source] BoxError),

    #[error("failed to register signal listener: {0}")]
    Signal(#[from] std::io::Error),

    #[error("engine must be started inside a tokio runtime")]
    Runtime,
}
