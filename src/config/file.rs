//! TOML sources: files on disk and inline strings.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;

/// A configuration source that loads from a TOML file.
///
/// Required files that don't exist cause an error; optional files that don't
/// exist are skipped.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// Creates a new file source.
    ///
    /// If `required` is true, loading fails if the file doesn't exist.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }
}

impl ConfigSource for FileSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                    path: self.path.clone(),
                    source: e,
                })?;
                debug!(path = %self.path.display(), "loaded config file");
                Ok(vec![ConfigEntry::root(table)])
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.required {
                    Err(ConfigError::FileNotFound(self.path.clone()))
                } else {
                    debug!(path = %self.path.display(), "optional config file missing, skipped");
                    Ok(vec![])
                }
            }
            Err(e) => Err(ConfigError::ReadError {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// A configuration source holding TOML text, e.g. embedded defaults from
/// `include_str!`.
#[derive(Debug, Clone)]
pub struct StrSource {
    contents: String,
}

impl StrSource {
    /// Creates a source from TOML text.
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
        }
    }
}

impl ConfigSource for StrSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let table = toml::from_str(&self.contents).map_err(ConfigError::InlineParseError)?;
        Ok(vec![ConfigEntry::root(table)])
    }
}
