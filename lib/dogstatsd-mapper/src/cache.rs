use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use lru::LruCache;

use crate::mapper::MapResult;

/// [`BuildHasher`][std::hash::BuildHasher] used for cache keys.
pub(crate) type FastBuildHasher = foldhash::quality::RandomState;

/// Outcome of mapping a metric name: the rewritten name and tags, or `None` if no mapping matched.
pub(crate) type Outcome = Option<Arc<MapResult>>;

/// A fixed-capacity, least-recently-used cache of mapping outcomes, keyed by raw metric name.
///
/// Both positive and negative outcomes are cached. The lock is only held for the lookup or insertion itself, never while
/// computing an outcome, so concurrent misses for the same name may each compute it; the last write wins, which is
/// harmless since outcomes for a given name never change.
pub(crate) struct ResultCache {
    inner: Mutex<LruCache<String, Outcome, FastBuildHasher>>,
}

impl ResultCache {
    /// Creates a new `ResultCache` holding at most `capacity` outcomes.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::with_hasher(capacity, FastBuildHasher::default())),
        }
    }

    /// Gets the cached outcome for the given metric name, marking it as most recently used.
    ///
    /// Returns `None` if no outcome has been cached, and `Some(None)` if the name is cached as not matching.
    pub fn get(&self, metric_name: &str) -> Option<Outcome> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.get(metric_name).cloned()
    }

    /// Caches the outcome for the given metric name, evicting the least recently used outcome if the cache is full.
    pub fn insert(&self, metric_name: &str, outcome: Outcome) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.put(metric_name.to_string(), outcome);
    }

    /// Returns the number of cached outcomes.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the maximum number of cached outcomes.
    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).cap().get()
    }
}
