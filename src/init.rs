use crate::engine::Engine;
use crate::layer::BananasLayer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the tracing integration.
///
/// **Fields**
/// - `min_level`: least severe level that is shipped; `INFO` ships
///   `INFO`, `WARN` and `ERROR`.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added on top of [`BananasLayer`] so events also reach the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that ships events through
/// `engine`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`BananasLayer`] as the
/// global default subscriber, so all `tracing` events in the process at
/// `config.min_level` or above become generic log events.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already set.
pub fn init_tracing_with_config(
    engine: Engine,
    config: LayerConfig,
) -> Result<(), SetGlobalDefaultError> {
    let layer = BananasLayer::new(engine, config.min_level);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(engine: Engine) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(engine, LayerConfig::default())
}
