use crate::config::ConfigError;
use crate::provider::ProviderError;
use thiserror::Error;

/// Top-level error type for the dragon-deps library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("application context requires a configuration")]
    MissingConfig,
}
