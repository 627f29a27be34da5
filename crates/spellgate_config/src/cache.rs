//! Memoization layer for settings resolution.
//!
//! Every cache is created through a [`CacheRegistry`] so that one
//! [`CacheRegistry::reset_all`] call clears all of them and bumps the epoch
//! under a single lock.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

/// A cache that can be flushed by the registry.
pub trait Clear: Send + Sync {
    /// Evicts every entry.
    fn clear(&self);

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Keyed async memoization.
///
/// Each key maps to a shared cell, so concurrent callers for the same key
/// await the same computation instead of starting their own. Clearing drops
/// the cells from the map; a computation that is still running finishes into
/// its detached cell and is never observed by later callers.
pub struct AsyncCache<K, V> {
    name: String,
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> AsyncCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, running `compute` on a miss.
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.entries.lock().entry(key.clone()).or_default().clone();
        cell.get_or_init(compute).await.clone()
    }

    /// Returns the value for `key` if it has already been computed.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of keys with a cell (computed or in flight).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when no key is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Clear for AsyncCache<K, V>
where
    K: Eq + Hash + Send,
    V: Send + Sync,
{
    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<K, V> fmt::Debug for AsyncCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCache")
            .field("name", &self.name)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

/// A lazily computed singleton value.
pub struct LazyValue<V> {
    name: String,
    cell: Mutex<Arc<OnceCell<V>>>,
}

impl<V: Clone> LazyValue<V> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// Computes the value once and returns it on every later call.
    pub async fn force<F, Fut>(&self, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.cell.lock().clone();
        cell.get_or_init(compute).await.clone()
    }

    /// Returns the value if it has been computed.
    pub fn get(&self) -> Option<V> {
        self.cell.lock().get().cloned()
    }
}

impl<V: Send + Sync> Clear for LazyValue<V> {
    fn clear(&self) {
        *self.cell.lock() = Arc::new(OnceCell::new());
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<V> fmt::Debug for LazyValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyValue")
            .field("name", &self.name)
            .field("initialized", &self.cell.lock().initialized())
            .finish()
    }
}

struct RegistryInner {
    caches: Vec<Weak<dyn Clear>>,
    epoch: u64,
}

/// Owner of every settings cache plus the invalidation epoch.
pub struct CacheRegistry {
    inner: Mutex<RegistryInner>,
}

impl CacheRegistry {
    /// Creates an empty registry at epoch 0.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                caches: Vec::new(),
                epoch: 0,
            }),
        }
    }

    /// Creates a keyed cache registered with this registry.
    pub fn cache<K, V>(&self, name: &str) -> Arc<AsyncCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let cache = Arc::new(AsyncCache::new(name));
        self.register(cache.clone());
        cache
    }

    /// Creates a lazy singleton registered with this registry.
    pub fn lazy<V>(&self, name: &str) -> Arc<LazyValue<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let value = Arc::new(LazyValue::new(name));
        self.register(value.clone());
        value
    }

    fn register(&self, cache: Arc<dyn Clear>) {
        let mut inner = self.inner.lock();
        inner.caches.retain(|c| c.strong_count() > 0);
        inner.caches.push(Arc::downgrade(&cache));
    }

    /// Clears every registered cache and bumps the epoch atomically.
    ///
    /// Returns the new epoch.
    pub fn reset_all(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.caches.retain(|weak| match weak.upgrade() {
            Some(cache) => {
                cache.clear();
                true
            }
            None => false,
        });
        inner.epoch += 1;
        debug!(
            "Cleared {} settings caches (epoch {})",
            inner.caches.len(),
            inner.epoch
        );
        inner.epoch
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Names of the live registered caches.
    pub fn cache_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .caches
            .iter()
            .filter_map(Weak::upgrade)
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CacheRegistry")
            .field("caches", &inner.caches.len())
            .field("epoch", &inner.epoch)
            .finish()
    }
}
