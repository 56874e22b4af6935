//! Disk Cache - A disk-backed content cache
//!
//! Stores values as individual files with TTL expiration, evicting the least
//! recently used entries once the store approaches its size budget. A generic
//! memoization facade layers cache-aside helpers over any key/value store.

pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod tasks;

pub use cache::{CacheStats, ContentKey, DiskStore, PrefixedStore};
pub use config::StoreConfig;
pub use error::{CacheError, Result};
pub use memo::{Cache, KeyValueStore, NoopStore};
