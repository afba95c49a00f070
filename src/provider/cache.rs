//! Shared compute-once storage backing memoized providers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, trace};
use uuid::Uuid;

static GLOBAL: Lazy<Arc<MemoCache>> = Lazy::new(|| Arc::new(MemoCache::new()));

/// Opaque identifier of a memoized provider's slot in a [`MemoCache`].
///
/// Keys are random and generated per provider instance, so two providers
/// wrapping the same computation never share an entry unless one was cloned
/// from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(Uuid);

impl CacheKey {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Slot = Arc<dyn Any + Send + Sync>;

/// Thread-safe cache of memoized provider values.
///
/// Each key owns a compute-once cell holding a value of the provider's type,
/// so a single cache serves providers of any value type. Entries live as
/// long as the cache; there is no eviction.
///
/// Lookups take a shared read lock and never wait on a running computation
/// for another key. On a miss the caller takes the key's cell and
/// initializes it; concurrent first readers of the same key block until the
/// winner finishes, then observe its value. A failed or panicking
/// initialization leaves the key's cell in place but empty, so the next
/// caller computes again. Cells are never removed: a waiter may still hold
/// one, and dropping it from the map would let a later reader start a
/// second computation for the same key.
///
/// Values are only reachable through a [`DependencyProvider`], which always
/// reads its key with the one type it was built for.
///
/// Hosts normally keep one cache per application lifetime (see
/// [`AppContext::cache`](crate::AppContext::cache)); [`MemoCache::global`]
/// is the process-wide default.
///
/// [`DependencyProvider`]: crate::DependencyProvider
#[derive(Default)]
pub struct MemoCache {
    slots: RwLock<HashMap<CacheKey, Slot>>,
}

impl MemoCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide cache used by providers that were not bound
    /// to a specific one.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the value stored under `key`, computing it with `init` if
    /// absent.
    ///
    /// `init` runs at most once per key across all threads among calls that
    /// succeed. An `Err` from `init` is returned to this caller unchanged and
    /// nothing is stored.
    pub(crate) fn get_or_try_insert_with<T, E, F>(&self, key: CacheKey, init: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        // Fast path: shared lock only.
        if let Some(value) = self.lookup::<T>(&key).and_then(|cell| cell.get().cloned()) {
            trace!(%key, "memo hit");
            return Ok(value);
        }

        let cell = self.cell::<T>(key);
        cell.get_or_try_init(|| {
            debug!(%key, value_type = std::any::type_name::<T>(), "computing memoized value");
            init()
        })
        .cloned()
    }

    fn lookup<T>(&self, key: &CacheKey) -> Option<Arc<OnceCell<T>>>
    where
        T: Send + Sync + 'static,
    {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(key)
            .and_then(|slot| Arc::clone(slot).downcast::<OnceCell<T>>().ok())
    }

    fn cell<T>(&self, key: CacheKey) -> Arc<OnceCell<T>>
    where
        T: Send + Sync + 'static,
    {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::<T>::new()) as Slot);

        match Arc::clone(slot).downcast::<OnceCell<T>>() {
            Ok(cell) => cell,
            Err(_) => {
                // A key is only ever used with one value type; replace a
                // foreign slot rather than hand out the wrong type.
                let cell = Arc::new(OnceCell::<T>::new());
                *slot = Arc::clone(&cell) as Slot;
                cell
            }
        }
    }

    /// Keys that have been read at least once, including ones whose
    /// computation failed and is still empty.
    fn key_count(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("keys", &self.key_count())
            .finish()
    }
}
