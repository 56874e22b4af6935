//! Cache Module
//!
//! Provides a disk-backed content cache with TTL expiration and LRU eviction.

pub mod entry;
mod key;
mod lru;
mod prefixed;
mod stats;
pub(crate) mod store;
pub mod writer;


// Re-export public types
pub use key::{ContentKey, KEY_SIZE};
pub use lru::{LruTracker, RecencyPolicy};
pub use prefixed::PrefixedStore;
pub use stats::{CacheStats, StoreCounters};
pub use store::DiskStore;
