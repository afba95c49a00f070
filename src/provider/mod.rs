//! Lazy and memoized value providers.

mod cache;
mod dependency;
mod error;

pub use cache::{CacheKey, MemoCache};
pub use dependency::{DependencyProvider, Mode, Provide};
pub use error::ProviderError;
