use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("memoize() cannot be called after value() has been called")]
    AlreadyRead,
}
