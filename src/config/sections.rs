//! Typed access to named configuration sections.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::debug;

use super::settings::{AppSettings, APP_SETTINGS_SECTION};
use super::ConfigError;
use crate::provider::{DependencyProvider, MemoCache};

/// A merged, resolved configuration that hands out individual sections.
///
/// Where [`Config::build`](super::Config::build) deserializes everything
/// into one type up front, `Sections` lets each component load only the
/// top-level table it cares about, as its own type.
///
/// ```
/// use dragon_deps::Config;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Mail {
///     relay: String,
/// }
///
/// let sections = Config::builder()
///     .with_str("[mail]\nrelay = \"smtp.local\"")
///     .load()?;
///
/// let mail: Mail = sections.section("mail")?;
/// assert_eq!(mail.relay, "smtp.local");
/// # Ok::<(), dragon_deps::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Sections {
    table: Arc<Table>,
    cache: Arc<MemoCache>,
}

impl Sections {
    /// Wraps an already merged table.
    pub fn from_table(table: Table) -> Self {
        Self {
            table: Arc::new(table),
            cache: MemoCache::global(),
        }
    }

    /// Memoizes section providers in `cache` instead of the process-wide
    /// cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MemoCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Returns `true` if a top-level section called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Names of all top-level sections, in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// The whole merged table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Deserializes the section `name` into `T`.
    ///
    /// Fails with [`ConfigError::SectionNotFound`] if there is no such
    /// section.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        self.optional_section(name)?
            .ok_or_else(|| ConfigError::SectionNotFound(name.to_string()))
    }

    /// Like [`section`](Self::section), returning `Ok(None)` when the
    /// section is absent.
    pub fn optional_section<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.table.get(name) else {
            debug!(section = name, "config section not present");
            return Ok(None);
        };

        debug!(section = name, "loading config section");
        deserialize_section(name, value.clone()).map(Some)
    }

    /// Deserializes the list section `name` (an array, usually written as
    /// `[[name]]` tables) into a `Vec<T>`.
    ///
    /// An empty list is an error unless `allow_empty` is set.
    pub fn section_list<T: DeserializeOwned>(
        &self,
        name: &str,
        allow_empty: bool,
    ) -> Result<Vec<T>, ConfigError> {
        self.optional_section_list(name, allow_empty)?
            .ok_or_else(|| ConfigError::SectionNotFound(name.to_string()))
    }

    /// Like [`section_list`](Self::section_list), returning `Ok(None)` when
    /// the section is absent.
    pub fn optional_section_list<T: DeserializeOwned>(
        &self,
        name: &str,
        allow_empty: bool,
    ) -> Result<Option<Vec<T>>, ConfigError> {
        let Some(value) = self.table.get(name) else {
            debug!(section = name, "config list section not present");
            return Ok(None);
        };

        let items = match value {
            Value::Array(items) => items,
            _ => return Err(ConfigError::NotAList(name.to_string())),
        };
        if items.is_empty() && !allow_empty {
            return Err(ConfigError::EmptySection(name.to_string()));
        }

        debug!(section = name, items = items.len(), "loading config list section");
        deserialize_section(name, value.clone()).map(Some)
    }

    /// Flat key/value settings from the `[app_settings]` section.
    ///
    /// Missing section means no settings, not an error.
    pub fn app_settings(&self) -> AppSettings {
        match self.table.get(APP_SETTINGS_SECTION) {
            Some(Value::Table(settings)) => AppSettings::new(settings.clone()),
            _ => AppSettings::default(),
        }
    }

    /// A memoized provider that loads section `name` on first read.
    ///
    /// A failed load is returned to the reader and retried on the next read.
    pub fn section_provider<T>(&self, name: &str) -> DependencyProvider<T, ConfigError>
    where
        T: DeserializeOwned + 'static,
    {
        let sections = self.clone();
        let name = name.to_string();
        self.memoized(move || sections.section(&name))
    }

    /// A memoized provider that loads list section `name` on first read.
    pub fn section_list_provider<T>(
        &self,
        name: &str,
        allow_empty: bool,
    ) -> DependencyProvider<Vec<T>, ConfigError>
    where
        T: DeserializeOwned + 'static,
    {
        let sections = self.clone();
        let name = name.to_string();
        self.memoized(move || sections.section_list(&name, allow_empty))
    }

    /// A memoized provider of the app settings lookup.
    pub fn app_settings_provider(&self) -> DependencyProvider<AppSettings> {
        let sections = self.clone();
        DependencyProvider::memoized_in(Arc::clone(&self.cache), move || sections.app_settings())
    }

    fn memoized<T, F>(&self, load: F) -> DependencyProvider<T, ConfigError>
    where
        F: Fn() -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        DependencyProvider::memoized_fallible_in(Arc::clone(&self.cache), load)
    }
}

fn deserialize_section<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, ConfigError> {
    value.try_into().map_err(|source| ConfigError::InvalidSection {
        section: name.to_string(),
        source,
    })
}
