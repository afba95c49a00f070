//! Configuration loading and management.

mod builder;
mod env;
mod error;
mod file;
mod resolve;
mod sections;
mod settings;
mod source;

pub use builder::Config;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::{FileSource, StrSource};
pub use sections::Sections;
pub use settings::{AppSettings, APP_SETTINGS_SECTION};
pub use source::{ConfigEntry, ConfigSource};
