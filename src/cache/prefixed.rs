//! Prefixed view over a disk store.

use async_trait::async_trait;
use chrono::Duration;

use crate::cache::{ContentKey, DiskStore};
use crate::memo::KeyValueStore;

/// Namespacing view: every key is hashed behind `prefix`, so views with
/// different prefixes never observe each other's entries.
#[derive(Clone)]
pub struct PrefixedStore {
    store: DiskStore,
    prefix: Vec<u8>,
}

impl PrefixedStore {
    pub fn new(store: DiskStore, prefix: Vec<u8>) -> Self {
        Self { store, prefix }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn content_key(&self, key: &[u8]) -> ContentKey {
        ContentKey::new(&self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for PrefixedStore {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(&self.content_key(key)).await
    }

    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) {
        self.store.set(&self.content_key(key), value, ttl).await
    }

    async fn remove(&self, key: &[u8]) {
        self.store.remove(&self.content_key(key)).await;
    }
}
