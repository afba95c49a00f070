use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::env::EnvSource;
use super::file::{FileSource, StrSource};
use super::resolve::resolve_references;
use super::sections::Sections;
use super::source::{merge_at_path, ConfigSource};
use super::ConfigError;

/// Builder for loading layered configuration.
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely.
///
/// ## Variable References
///
/// String values can reference other config values using `${path.to.field}` syntax:
///
/// ```toml
/// [server]
/// host = "localhost"
/// port = 8080
/// url = "http://${server.host}:${server.port}/api"
/// ```
///
/// Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).
///
/// ## Example
///
/// ```no_run
/// use dragon_deps::Config;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct MyConfig {
///     name: String,
///     port: u16,
/// }
///
/// let config: MyConfig = Config::builder()
///     .with_file("config/default.toml", true)
///     .with_env("MYAPP", "__")
///     .with_file("config/local.toml", false)
///     .build()?;
/// # Ok::<(), dragon_deps::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() or .load() is called"]
pub struct Config {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a TOML file.
    ///
    /// If `required` is `true`, loading fails if the file doesn't exist.
    /// Optional files that are missing are skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Adds inline TOML, e.g. defaults embedded with `include_str!`.
    pub fn with_str(self, contents: impl Into<String>) -> Self {
        self.with_source(StrSource::new(contents))
    }

    /// Adds environment variables named `PREFIX<separator>PATH`.
    ///
    /// With prefix `MYAPP` and separator `__`, `MYAPP__DATABASE__PORT=5432`
    /// sets `database.port` to the integer `5432`.
    ///
    /// # Panics
    ///
    /// Panics if `separator` is empty.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds a custom source.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Loads, merges, resolves and deserializes the whole configuration
    /// into `T`.
    pub fn build<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        let table = self.merge()?;
        toml::Value::Table(table)
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }

    /// Loads, merges and resolves the configuration, keeping it as
    /// [`Sections`] for per-section access.
    pub fn load(self) -> Result<Sections, ConfigError> {
        self.merge().map(Sections::from_table)
    }

    fn merge(self) -> Result<toml::Table, ConfigError> {
        let mut merged = toml::Table::new();

        for source in &self.sources {
            let entries = source.entries()?;
            debug!(?source, entries = entries.len(), "applying config source");
            for entry in entries {
                merge_at_path(&mut merged, &entry.path, entry.value);
            }
        }

        resolve_references(&mut merged)?;
        Ok(merged)
    }
}
