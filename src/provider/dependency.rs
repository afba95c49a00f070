use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::cache::{CacheKey, MemoCache};
use super::ProviderError;

type Producer<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

/// Caching policy of a [`DependencyProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every read re-invokes the producer.
    PerInstance,
    /// The first successful result is cached and reused.
    Memoized,
}

/// Lazily supplies a value of type `T`.
///
/// Useful for injecting dependencies that have no mockable interface of
/// their own (the current time, a configuration section, an app setting):
/// production code passes a provider that computes the real value, tests
/// pass one that returns a fixed value.
///
/// A provider starts in [`Mode::PerInstance`]. Calling
/// [`memoize`](Self::memoize) before the first read switches it to
/// [`Mode::Memoized`], after which the producer runs at most once for this
/// instance (and its clones) no matter how many threads race on the first
/// read. Memoization is per instance: two providers built from the same
/// closure compute independently.
///
/// `E` is the producer's error type. Providers built from infallible
/// closures use [`value`](DependencyProvider::value); fallible ones use
/// [`try_value`](Self::try_value), and a failed computation is never cached.
///
/// ## Example
///
/// ```
/// use dragon_deps::DependencyProvider;
/// use std::time::SystemTime;
///
/// struct Stamper {
///     clock: DependencyProvider<SystemTime>,
/// }
///
/// impl Stamper {
///     fn stamp(&self) -> SystemTime {
///         self.clock.value()
///     }
/// }
///
/// // production
/// let live = Stamper { clock: DependencyProvider::new(SystemTime::now) };
///
/// // test
/// let fixed = SystemTime::UNIX_EPOCH;
/// let frozen = Stamper { clock: DependencyProvider::from_value(fixed) };
/// assert_eq!(frozen.stamp(), fixed);
/// # let _ = live.stamp();
/// ```
pub struct DependencyProvider<T, E = Infallible> {
    producer: Producer<T, E>,
    key: Option<CacheKey>,
    cache: Arc<MemoCache>,
    has_been_read: AtomicBool,
}

impl<T> DependencyProvider<T, Infallible> {
    /// Creates a per-instance provider backed by `producer`.
    ///
    /// Nothing is computed until the first read.
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::fallible(move || Ok(producer()))
    }

    /// Creates a memoized provider backed by `producer`.
    ///
    /// Shorthand for `new` followed by `memoize`.
    pub fn memoized<F>(producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::memoized_fallible(move || Ok(producer()))
    }

    /// Like [`memoized`](Self::memoized), storing the value in `cache`
    /// instead of the process-wide cache.
    pub fn memoized_in<F>(cache: Arc<MemoCache>, producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::memoized_fallible_in(cache, move || Ok(producer()))
    }

    /// Creates a memoized provider that always returns `value`.
    pub fn from_value(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::memoized(move || value.clone())
    }

    /// Returns the value, computing it if needed.
    ///
    /// Marks the provider as read; [`memoize`](Self::memoize) fails from
    /// then on.
    pub fn value(&self) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.try_value() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T, E> DependencyProvider<T, E> {
    /// Creates a per-instance provider backed by a fallible `producer`.
    pub fn fallible<F>(producer: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
            key: None,
            cache: MemoCache::global(),
            has_been_read: AtomicBool::new(false),
        }
    }

    /// Creates a memoized provider backed by a fallible `producer`.
    ///
    /// Errors are returned to the reader and not cached, so the next read
    /// tries again.
    pub fn memoized_fallible<F>(producer: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let mut provider = Self::fallible(producer);
        provider.promote();
        provider
    }

    /// Like [`memoized_fallible`](Self::memoized_fallible), storing the value
    /// in `cache` instead of the process-wide cache.
    pub fn memoized_fallible_in<F>(cache: Arc<MemoCache>, producer: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let mut provider = Self::memoized_fallible(producer);
        provider.cache = cache;
        provider
    }

    /// Switches the provider to [`Mode::Memoized`].
    ///
    /// Returns [`ProviderError::AlreadyRead`] if the value has already been
    /// read; the provider is left untouched in that case. Calling it again
    /// before the first read keeps the existing cache key.
    pub fn memoize(&mut self) -> Result<&mut Self, ProviderError> {
        if *self.has_been_read.get_mut() {
            return Err(ProviderError::AlreadyRead);
        }
        self.promote();
        Ok(self)
    }

    /// Stores memoized values in `cache` instead of the process-wide cache.
    ///
    /// Like [`memoize`](Self::memoize), only allowed before the first read.
    pub fn bind_cache(&mut self, cache: Arc<MemoCache>) -> Result<&mut Self, ProviderError> {
        if *self.has_been_read.get_mut() {
            return Err(ProviderError::AlreadyRead);
        }
        self.cache = cache;
        Ok(self)
    }

    /// Returns the value, computing it if needed.
    ///
    /// In [`Mode::PerInstance`] the producer runs on every call. In
    /// [`Mode::Memoized`] it runs only until it first succeeds.
    pub fn try_value(&self) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.has_been_read.store(true, Ordering::Release);

        match self.key {
            None => (self.producer)(),
            Some(key) => self
                .cache
                .get_or_try_insert_with(key, || (self.producer)()),
        }
    }

    /// Returns the current caching policy.
    pub fn mode(&self) -> Mode {
        if self.key.is_some() {
            Mode::Memoized
        } else {
            Mode::PerInstance
        }
    }

    /// Returns `true` once the value has been read; the mode is frozen from
    /// then on.
    pub fn has_been_read(&self) -> bool {
        self.has_been_read.load(Ordering::Acquire)
    }

    /// The key this provider memoizes under, if it is memoized.
    pub fn cache_key(&self) -> Option<CacheKey> {
        self.key
    }

    fn promote(&mut self) {
        if self.key.is_none() {
            let key = CacheKey::generate();
            debug!(%key, "provider memoized");
            self.key = Some(key);
        }
    }
}

/// Clones share the producer and, when memoized, the cache entry.
impl<T, E> Clone for DependencyProvider<T, E> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            key: self.key,
            cache: Arc::clone(&self.cache),
            has_been_read: AtomicBool::new(self.has_been_read()),
        }
    }
}

impl<T, E> fmt::Debug for DependencyProvider<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProvider")
            .field("mode", &self.mode())
            .field("key", &self.key)
            .field("has_been_read", &self.has_been_read())
            .finish_non_exhaustive()
    }
}

/// Something that hands out a `T` on demand.
///
/// Consumers that only need the value can accept `impl Provide<T>` and let
/// callers pass a [`DependencyProvider`] or their own implementation.
pub trait Provide<T> {
    fn provide(&self) -> T;
}

impl<T> Provide<T> for DependencyProvider<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn provide(&self) -> T {
        self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Arc<AtomicUsize>, impl Fn() -> usize + Send + Sync + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        (calls, move || counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[test]
    fn test_per_instance_recomputes_every_read() {
        let (calls, producer) = counting();
        let provider = DependencyProvider::new(producer);

        for n in 1..=5 {
            assert_eq!(provider.value(), n);
            assert_eq!(calls.load(Ordering::SeqCst), n);
        }
        assert_eq!(provider.mode(), Mode::PerInstance);
    }

    #[test]
    fn test_memoized_computes_once() {
        let (calls, producer) = counting();
        let provider = DependencyProvider::memoized_in(Arc::new(MemoCache::new()), producer);

        for _ in 0..5 {
            assert_eq!(provider.value(), 1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
        assert_eq!(provider.mode(), Mode::Memoized);
    }

    #[test]
    fn test_memoize_before_read() {
        let (calls, producer) = counting();
        let mut provider = DependencyProvider::new(producer);
        provider.memoize().unwrap();

        assert_eq!(provider.value(), 1);
        assert_eq!(provider.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_memoize_twice_keeps_key() {
        let mut provider = DependencyProvider::new(|| 1);
        provider.memoize().unwrap();
        let key = provider.cache_key();
        provider.memoize().unwrap();

        assert!(key.is_some());
        assert_eq!(provider.cache_key(), key);
    }

    #[test]
    fn test_from_value() {
        let provider = DependencyProvider::from_value(123);

        assert_eq!(provider.mode(), Mode::Memoized);
        for _ in 0..5 {
            assert_eq!(provider.value(), 123);
        }
    }

    #[test]
    fn test_memoize_after_read_fails() {
        let mut provider = DependencyProvider::new(|| "Sparky".to_string());
        assert_eq!(provider.value(), "Sparky");

        let err = provider.memoize().unwrap_err();
        assert_eq!(err, ProviderError::AlreadyRead);
        assert_eq!(
            err.to_string(),
            "memoize() cannot be called after value() has been called"
        );
    }

    #[test]
    fn test_failed_memoize_leaves_provider_unchanged() {
        let (calls, producer) = counting();
        let mut provider = DependencyProvider::new(producer);
        assert_eq!(provider.value(), 1);

        assert!(provider.memoize().is_err());
        assert_eq!(provider.mode(), Mode::PerInstance);
        assert_eq!(provider.cache_key(), None);
        assert_eq!(provider.value(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_memoize_after_read_fails() {
        let mut provider = DependencyProvider::memoized(|| "Sparky".to_string());
        assert_eq!(provider.value(), "Sparky");

        assert!(matches!(provider.memoize(), Err(ProviderError::AlreadyRead)));
        assert_eq!(provider.value(), "Sparky");
    }

    #[test]
    fn test_bind_cache_after_read_fails() {
        let mut provider = DependencyProvider::new(|| 1);
        provider.value();

        let result = provider.bind_cache(Arc::new(MemoCache::new()));
        assert!(matches!(result, Err(ProviderError::AlreadyRead)));
    }

    #[test]
    fn test_per_instance_error_is_not_sticky() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let provider = DependencyProvider::fallible(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("not yet")
            } else {
                Ok(42)
            }
        });

        assert_eq!(provider.try_value(), Err("not yet"));
        assert_eq!(provider.try_value(), Ok(42));
    }

    #[test]
    fn test_memoized_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut provider = DependencyProvider::memoized_fallible(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("not yet")
            } else {
                Ok(42)
            }
        });
        provider.bind_cache(Arc::new(MemoCache::new())).unwrap();

        assert_eq!(provider.try_value(), Err("not yet"));
        assert_eq!(provider.try_value(), Ok(42));
        assert_eq!(provider.try_value(), Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_independent_providers_do_not_share_memo() {
        let (calls, producer) = counting();
        let producer = Arc::new(producer);
        let first = {
            let producer = Arc::clone(&producer);
            DependencyProvider::memoized(move || (*producer)())
        };
        let second = DependencyProvider::memoized(move || (*producer)());

        assert_eq!(first.value(), 1);
        assert_eq!(second.value(), 2);
        assert_eq!(first.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clone_shares_memo() {
        let (calls, producer) = counting();
        let original = DependencyProvider::memoized(producer);
        let copy = original.clone();

        assert_eq!(copy.value(), 1);
        assert_eq!(original.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provide_trait() {
        fn consume(source: &impl Provide<String>) -> String {
            source.provide()
        }

        let provider = DependencyProvider::from_value("test".to_string());
        assert_eq!(consume(&provider), "test");
    }
}
