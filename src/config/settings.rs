use std::sync::Arc;

use toml::Table;

use super::resolve::scalar_to_string;
use super::ConfigError;

/// Name of the top-level table [`AppSettings`] is read from.
pub const APP_SETTINGS_SECTION: &str = "app_settings";

/// String lookups over the flat `[app_settings]` table.
///
/// Scalars are rendered as strings; arrays and nested tables are not
/// settings and read as absent.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    values: Arc<Table>,
}

impl AppSettings {
    pub(crate) fn new(values: Table) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns the setting `key` rendered as a string, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(scalar_to_string)
    }

    /// Like [`get`](Self::get), failing with
    /// [`ConfigError::SettingNotFound`] when the key is absent.
    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::SettingNotFound(key.to_string()))
    }

    /// Number of entries in the `[app_settings]` table.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no settings.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
