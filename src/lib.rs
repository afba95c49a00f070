//! Lazy, optionally memoized dependency providers and typed configuration
//! loading.
//!
//! A [`DependencyProvider`] defers computing a value until it is read and
//! can be promoted to compute it at most once. [`Config`] layers TOML files,
//! inline TOML and environment variables, and [`Sections`] hands out typed
//! sections of the result, either directly or through memoized providers.

pub mod config;
pub mod context;
mod error;
pub mod provider;

pub use config::{AppSettings, Config, ConfigError, Sections};
pub use context::AppContext;
pub use error::Error;
pub use provider::{CacheKey, DependencyProvider, MemoCache, Mode, Provide, ProviderError};
