use stash_config::ConfigError;
use stash_core::CoreError;
use thiserror::Error;

/// Error type surfaced by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
