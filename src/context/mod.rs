//! Application context for managing shared application state.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{AppSettings, ConfigError, Sections};
use crate::provider::{DependencyProvider, MemoCache};
use crate::Error;

/// Central application context holding configuration and the memo cache
/// shared by the application's memoized providers.
///
/// Generic over the configuration type `C`: either a type deserialized once
/// at build time with [`Config::build`](crate::Config::build), or
/// [`Sections`] from [`Config::load`](crate::Config::load) for per-section
/// access.
///
/// The context owns one [`MemoCache`] for its lifetime, so values memoized
/// through it are computed at most once per application rather than once
/// per process, and tests can run isolated contexts side by side.
///
/// ## Example
///
/// ```no_run
/// use dragon_deps::{AppContext, Config};
/// use serde::Deserialize;
///
/// #[derive(Clone, Deserialize)]
/// struct Database {
///     url: String,
/// }
///
/// let ctx = AppContext::builder()
///     .with_config(
///         Config::builder()
///             .with_file("config.toml", true)
///             .load()?
///     )
///     .build()?;
///
/// let database = ctx.section_provider::<Database>("database");
/// let url = database.try_value()?.url;
/// # Ok::<(), dragon_deps::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext<C> {
    config: C,
    cache: Arc<MemoCache>,
}

impl<C> AppContext<C> {
    /// Returns a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// The cache backing this context's memoized providers.
    pub fn cache(&self) -> &Arc<MemoCache> {
        &self.cache
    }

    /// Creates a provider that computes `producer` at most once for the life
    /// of this context.
    pub fn memoized<T, F>(&self, producer: F) -> DependencyProvider<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        DependencyProvider::memoized_in(Arc::clone(&self.cache), producer)
    }
}

impl AppContext<Sections> {
    /// A memoized provider of section `name`, cached in this context.
    pub fn section_provider<T>(&self, name: &str) -> DependencyProvider<T, ConfigError>
    where
        T: DeserializeOwned + 'static,
    {
        self.sections().section_provider(name)
    }

    /// A memoized provider of the `[app_settings]` lookup, cached in this
    /// context.
    pub fn app_settings_provider(&self) -> DependencyProvider<AppSettings> {
        self.sections().app_settings_provider()
    }

    fn sections(&self) -> Sections {
        self.config.clone().with_cache(Arc::clone(&self.cache))
    }
}

impl AppContext<()> {
    /// Creates a new builder for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder<()> {
        AppContextBuilder {
            config: None,
            cache: None,
        }
    }
}

/// Builder for constructing an [`AppContext`].
///
/// The builder starts with no config (`AppContextBuilder<()>`) and transitions
/// to `AppContextBuilder<C>` when [`with_config`](Self::with_config) is called.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder<C> {
    config: Option<C>,
    cache: Option<Arc<MemoCache>>,
}

impl AppContextBuilder<()> {
    /// Attaches a configuration to the application context.
    pub fn with_config<C>(self, config: C) -> AppContextBuilder<C> {
        AppContextBuilder {
            config: Some(config),
            cache: self.cache,
        }
    }
}

impl<C> AppContextBuilder<C> {
    /// Uses `cache` instead of a fresh one, e.g. [`MemoCache::global`] to
    /// share memoized values with providers created outside the context.
    pub fn with_cache(mut self, cache: Arc<MemoCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the `AppContext`.
    ///
    /// Returns an error if no configuration was provided.
    pub fn build(self) -> Result<AppContext<C>, Error> {
        Ok(AppContext {
            config: self.config.ok_or(Error::MissingConfig)?,
            cache: self.cache.unwrap_or_default(),
        })
    }
}
