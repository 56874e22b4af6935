//! No-op store: caches nothing.

use async_trait::async_trait;
use chrono::Duration;

use crate::memo::KeyValueStore;

/// Store that drops every write and misses every read, for running a
/// [`Cache`](crate::memo::Cache) with caching disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl KeyValueStore for NoopStore {
    async fn get(&self, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    async fn set(&self, _key: &[u8], _value: &[u8], _ttl: Duration) {}

    async fn remove(&self, _key: &[u8]) {}
}
