//! Memoization Module
//!
//! Generic cache facade over any key/value store: cache-aside helpers that
//! tell "not cached" apart from "cached as no value".

mod noop;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;

pub use noop::NoopStore;

/// Stored in place of a computed "no value" result.
pub const NIL_SENTINEL: &[u8] = &[0, 255, 1, 5, 29, 4];

// == Key Value Store ==
/// Best-effort byte store consumed by [`Cache`].
///
/// Implementations absorb their own failures: a failed `get` is a miss and a
/// failed `set` or `remove` is a no-op.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// A zero `ttl` means practically permanent, a negative one already expired.
    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration);

    async fn remove(&self, key: &[u8]);
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) {
        (**self).set(key, value, ttl).await
    }

    async fn remove(&self, key: &[u8]) {
        (**self).remove(key).await
    }
}

pub fn is_nil(value: &[u8]) -> bool {
    value == NIL_SENTINEL
}

fn from_stored(value: Vec<u8>) -> Option<Vec<u8>> {
    if is_nil(&value) {
        None
    } else {
        Some(value)
    }
}

// == Cache ==
/// Memoization facade.
///
/// Concurrent misses on one key are not deduplicated: every caller that
/// misses runs its compute function.
#[derive(Debug, Clone)]
pub struct Cache<S> {
    store: S,
}

impl<S: KeyValueStore> Cache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cached value; a cached "no value" reads as `None`.
    pub async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key).await.and_then(from_stored)
    }

    // == Get Func ==
    /// Cache-aside lookup: on a miss, runs `compute` and stores its result.
    ///
    /// A `None` result is cached too, so the next call does not recompute.
    pub async fn get_func<F, Fut>(&self, key: &[u8], ttl: Duration, compute: F) -> Option<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Vec<u8>>>,
    {
        if let Some(cached) = self.store.get(key).await {
            return from_stored(cached);
        }

        let value = compute().await;
        self.store
            .set(key, value.as_deref().unwrap_or(NIL_SENTINEL), ttl)
            .await;
        value
    }

    // == Get Func Err ==
    /// Like [`Cache::get_func`], but `compute` may fail. Errors are returned
    /// unchanged and nothing is cached.
    pub async fn get_func_err<E, F, Fut>(
        &self,
        key: &[u8],
        ttl: Duration,
        compute: F,
    ) -> Result<Option<Vec<u8>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, E>>,
    {
        if let Some(cached) = self.store.get(key).await {
            return Ok(from_stored(cached));
        }

        let value = compute().await?;
        self.store
            .set(key, value.as_deref().unwrap_or(NIL_SENTINEL), ttl)
            .await;
        Ok(value)
    }

    // == Get JSON Func Err ==
    /// Memoizes a structured result, stored as JSON.
    ///
    /// A cached payload that no longer decodes as `T` is reported as
    /// [`CacheError::Serialization`].
    pub async fn get_json_func_err<T, E, F, Fut>(
        &self,
        key: &[u8],
        ttl: Duration,
        compute: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(cached) = self.store.get(key).await {
            if is_nil(&cached) {
                return Ok(None);
            }
            let value = serde_json::from_slice(&cached).map_err(CacheError::from)?;
            return Ok(Some(value));
        }

        let value = compute().await?;
        let encoded = match &value {
            Some(v) => serde_json::to_vec(v).map_err(CacheError::from)?,
            None => NIL_SENTINEL.to_vec(),
        };
        self.store.set(key, &encoded, ttl).await;
        Ok(value)
    }

    pub async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) {
        self.store.set(key, value, ttl).await
    }

    pub async fn remove(&self, key: &[u8]) {
        self.store.remove(key).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde::Deserialize;

    /// Map-backed store recording every write.
    #[derive(Default)]
    struct MapStore {
        entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for MapStore {
        async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
            self.entries.lock().get(key).cloned()
        }

        async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if ttl < Duration::zero() {
                self.entries.lock().remove(key);
            } else {
                self.entries.lock().insert(key.to_vec(), value.to_vec());
            }
        }

        async fn remove(&self, key: &[u8]) {
            self.entries.lock().remove(key);
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    #[derive(Debug)]
    enum AppError {
        Upstream,
        Cache(CacheError),
    }

    impl From<CacheError> for AppError {
        fn from(err: CacheError) -> Self {
            AppError::Cache(err)
        }
    }

    #[tokio::test]
    async fn test_get_func_caches_value() {
        let cache = Cache::new(MapStore::default());
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let value = cache
                .get_func(b"k", Duration::zero(), move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Some(b"computed".to_vec())
                })
                .await;
            assert_eq!(value, Some(b"computed".to_vec()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.store().writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_func_caches_none() {
        let cache = Cache::new(MapStore::default());
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            let value = cache
                .get_func(b"nil", Duration::zero(), move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    None
                })
                .await;
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(b"nil").await, None);
        assert_eq!(cache.store().get(b"nil").await, Some(NIL_SENTINEL.to_vec()));
    }

    #[tokio::test]
    async fn test_get_func_err_does_not_cache_errors() {
        let cache = Cache::new(MapStore::default());

        let result: Result<Option<Vec<u8>>, &str> = cache
            .get_func_err(b"k", Duration::zero(), || async { Err("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert_eq!(cache.store().writes.load(Ordering::SeqCst), 0);

        let result: Result<Option<Vec<u8>>, &str> = cache
            .get_func_err(b"k", Duration::zero(), || async { Ok(Some(b"v".to_vec())) })
            .await;
        assert_eq!(result, Ok(Some(b"v".to_vec())));

        let result: Result<Option<Vec<u8>>, &str> = cache
            .get_func_err(b"k", Duration::zero(), || async { Err("not called") })
            .await;
        assert_eq!(result, Ok(Some(b"v".to_vec())));
    }

    #[tokio::test]
    async fn test_get_func_err_caches_none() {
        let cache = Cache::new(MapStore::default());

        let first: Result<_, ()> = cache
            .get_func_err(b"k", Duration::zero(), || async { Ok(None) })
            .await;
        let second: Result<_, ()> = cache
            .get_func_err(b"k", Duration::zero(), || async { Err(()) })
            .await;

        assert_eq!(first, Ok(None));
        assert_eq!(second, Ok(None));
    }

    #[tokio::test]
    async fn test_get_json_func_err_roundtrip() {
        let cache = Cache::new(MapStore::default());
        let profile = || async {
            Ok::<_, AppError>(Some(Profile {
                name: "ada".to_string(),
                visits: 3,
            }))
        };

        let first = cache.get_json_func_err(b"p", Duration::zero(), profile).await.unwrap();
        let second: Option<Profile> = cache
            .get_json_func_err(b"p", Duration::zero(), || async { Err(AppError::Upstream) })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.unwrap().visits, 3);
    }

    #[tokio::test]
    async fn test_get_json_func_err_propagates_and_decodes() {
        let cache = Cache::new(MapStore::default());

        let result: Result<Option<Profile>, AppError> = cache
            .get_json_func_err(b"p", Duration::zero(), || async { Err(AppError::Upstream) })
            .await;
        assert!(matches!(result, Err(AppError::Upstream)));

        cache.set(b"p", b"not json", Duration::zero()).await;
        let result: Result<Option<Profile>, AppError> = cache
            .get_json_func_err(b"p", Duration::zero(), || async { Ok(None) })
            .await;
        assert!(matches!(result, Err(AppError::Cache(CacheError::Serialization(_)))));
    }

    #[tokio::test]
    async fn test_negative_ttl_invalidates() {
        let cache = Cache::new(MapStore::default());

        cache.set(b"k", b"v", Duration::zero()).await;
        assert_eq!(cache.get(b"k").await, Some(b"v".to_vec()));

        cache.set(b"k", b"v2", Duration::seconds(-1)).await;
        assert_eq!(cache.get(b"k").await, None);
    }

    #[tokio::test]
    async fn test_cache_over_shared_trait_object() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MapStore::default());
        let cache = Cache::new(store);

        cache.set(b"k", b"v", Duration::zero()).await;
        assert_eq!(cache.get(b"k").await, Some(b"v".to_vec()));
        cache.remove(b"k").await;
        assert_eq!(cache.get(b"k").await, None);
    }

    #[test]
    fn test_is_nil() {
        assert!(is_nil(NIL_SENTINEL));
        assert!(!is_nil(b""));
        assert!(!is_nil(&[0, 255, 1, 5, 29]));
        assert!(!is_nil(&[0, 255, 1, 5, 29, 4, 0]));
    }
}
