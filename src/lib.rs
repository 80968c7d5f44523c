pub mod error;
pub mod record;
pub mod host;
pub mod config;
pub mod env;
pub mod hostname;
pub mod builder;
pub mod buffer;
pub mod sink;
pub mod sender;
pub mod scheduler;
pub mod hooks;
pub mod engine;
pub mod layer;

#[cfg(feature = "http")]
pub mod http;

pub mod init;
pub mod noop_sink;
