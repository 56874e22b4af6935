//! Cache Store Module
//!
//! Disk-backed cache engine: one file per entry, an in-memory LRU index and a
//! background eviction task bounding the total size.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tokio::fs::{self, DirBuilder, File};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::entry::{entry_size, EntryHeader, HEADER_SIZE};
use crate::cache::writer::{self, is_pending, pending_path};
use crate::cache::{CacheStats, ContentKey, LruTracker, PrefixedStore, RecencyPolicy, StoreCounters};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::memo::Cache;
use crate::tasks::{spawn_eviction_task, EvictionPass};

/// Result of reading an entry file.
enum ReadOutcome {
    Live(Vec<u8>),
    Missing,
    /// Expired, truncated or unreadable after open; the file should go
    Stale,
    /// Open failed for a reason other than absence; the file is left alone
    Unreadable,
}

/// Outcome of a single eviction step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EvictStep {
    Evicted(u64),
    /// The index named an entry whose file was already gone
    Missing,
    /// The file is still on disk; its key was put back in the index
    Failed,
    Empty,
}

/// Result of deleting an entry file.
enum Deletion {
    Freed(u64),
    Absent,
    /// The file exists but could not be removed
    Failed,
}

struct ScannedEntry {
    key: ContentKey,
    size: u64,
    modified: SystemTime,
}

// == Store Inner ==
/// State shared by store handles and the eviction task.
pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    data_path: PathBuf,
    index: Mutex<Box<dyn RecencyPolicy>>,
    counters: StoreCounters,
    evict_tx: mpsc::Sender<EvictionPass>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StoreInner {
    fn entry_path(&self, key: &ContentKey) -> PathBuf {
        key.path_in(&self.data_path)
    }

    pub(crate) fn size_bytes(&self) -> i64 {
        self.counters.size_bytes()
    }

    /// Queues an eviction pass. A no-op if one is already queued.
    pub(crate) fn trigger(&self, pass: EvictionPass) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.evict_tx.try_send(pass) {
            debug!("Eviction task is gone, dropping trigger");
        }
    }

    async fn read_entry(&self, path: &Path) -> ReadOutcome {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return ReadOutcome::Missing,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to open cache file");
                return ReadOutcome::Unreadable;
            }
        };

        let mut raw = [0u8; HEADER_SIZE];
        if let Err(err) = file.read_exact(&mut raw).await {
            warn!(path = %path.display(), error = %err, "Cache file exists but failed to read the header");
            return ReadOutcome::Stale;
        }
        let header = match EntryHeader::decode(&raw) {
            Some(header) => header,
            None => return ReadOutcome::Stale,
        };
        if header.is_expired(Utc::now()) {
            return ReadOutcome::Stale;
        }

        let mut value = Vec::new();
        if let Err(err) = file.read_to_end(&mut value).await {
            warn!(path = %path.display(), error = %err, "Cache file exists but failed to read the data");
            return ReadOutcome::Stale;
        }
        ReadOutcome::Live(value)
    }

    /// Deletes an entry file and its pending sibling.
    async fn delete_files(&self, path: &Path) -> Deletion {
        let outcome = match fs::metadata(path).await {
            Ok(meta) => match fs::remove_file(path).await {
                Ok(()) => Deletion::Freed(meta.len()),
                Err(err) if err.kind() == ErrorKind::NotFound => Deletion::Absent,
                Err(err) => {
                    error!(path = %path.display(), error = %err,
                        "Failed to remove cache data file, this could mean disk or filesystem failure");
                    Deletion::Failed
                }
            },
            Err(_) => Deletion::Absent,
        };
        let _ = fs::remove_file(pending_path(path)).await;

        if let Deletion::Freed(bytes) = outcome {
            self.counters.adjust(-(bytes as i64), -1);
            self.counters.record_delete(bytes);
        }
        outcome
    }

    /// Deletes an entry. A file that could not be deleted stays tracked.
    pub(crate) async fn remove_entry(&self, key: &ContentKey) -> bool {
        match self.delete_files(&self.entry_path(key)).await {
            Deletion::Freed(_) => {
                self.index.lock().remove(key);
                true
            }
            Deletion::Absent => {
                if self.index.lock().remove(key) {
                    warn!(key = %key, "Index referenced a cache file that no longer exists");
                }
                false
            }
            Deletion::Failed => false,
        }
    }

    // == Evict Oldest ==
    /// Removes the least recently used entry.
    ///
    /// An entry whose file cannot be deleted goes back to the front of the
    /// index, so the next step moves on to another victim.
    pub(crate) async fn evict_oldest(&self) -> EvictStep {
        let victim = self.index.lock().evict_oldest();
        let Some(key) = victim else {
            return EvictStep::Empty;
        };

        match self.delete_files(&self.entry_path(&key)).await {
            Deletion::Freed(bytes) => {
                self.counters.record_eviction();
                EvictStep::Evicted(bytes)
            }
            Deletion::Absent => {
                warn!(key = %key, "Evicted index entry had no cache file");
                EvictStep::Missing
            }
            Deletion::Failed => {
                self.index.lock().push(key);
                EvictStep::Failed
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// == Disk Store ==
/// Capacity-bounded, crash-tolerant key/value store persisting one file per
/// entry under `<base>/data/<hex[0..2]>/<hex[2..4]>/<hex>`.
///
/// Handles are cheap to clone and share one index, one set of counters and
/// one eviction task.
#[derive(Clone)]
pub struct DiskStore {
    inner: Arc<StoreInner>,
}

impl DiskStore {
    // == Constructor ==
    /// Opens a store under `base_path` bounded to `max_size_bytes`.
    ///
    /// Must be called within a tokio runtime. Fails if the data directory
    /// cannot be created or scanned.
    pub async fn open(base_path: impl Into<PathBuf>, max_size_bytes: u64) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(base_path, max_size_bytes)).await
    }

    pub async fn open_with_config(config: StoreConfig) -> Result<Self> {
        Self::open_with_policy(config, Box::new(LruTracker::new())).await
    }

    /// Opens a store whose eviction order is kept by `policy`.
    ///
    /// # Startup Sequence
    /// 1. Create the data root
    /// 2. Walk it: sweep `.pending` leftovers, total sizes, collect entries
    /// 3. Seed the index oldest-first by modification time
    /// 4. Start the eviction task, triggering it if already over capacity
    pub async fn open_with_policy(
        config: StoreConfig,
        mut policy: Box<dyn RecencyPolicy>,
    ) -> Result<Self> {
        config.validate()?;
        let data_path = config.data_path();

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o750);
        builder
            .create(&data_path)
            .await
            .map_err(|err| CacheError::io(&data_path, err))?;

        let started = std::time::Instant::now();
        let mut entries = scan_data_dir(&data_path).await?;

        // stable sort: equal timestamps keep walk order
        entries.sort_by_key(|entry| entry.modified);
        let size: u64 = entries.iter().map(|entry| entry.size).sum();
        let count = entries.len() as u64;
        for entry in &entries {
            policy.push(entry.key);
        }

        let counters = StoreCounters::new();
        counters.reset_size(size, count);
        info!(
            path = %data_path.display(),
            size_bytes = size,
            count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cache directory scan complete"
        );

        let (evict_tx, evict_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let interval = config.eviction_interval;
        let max_size = config.max_size_bytes;

        let inner = Arc::new(StoreInner {
            config,
            data_path,
            index: Mutex::new(policy),
            counters,
            evict_tx,
            shutdown: shutdown.clone(),
            worker: Mutex::new(None),
        });

        let handle = spawn_eviction_task(Arc::downgrade(&inner), evict_rx, shutdown, interval);
        *inner.worker.lock() = Some(handle);

        if size > max_size {
            inner.trigger(EvictionPass::Exhausted);
        }

        Ok(Self { inner })
    }

    // == Close ==
    /// Stops the eviction task and waits for it to exit.
    ///
    /// Other operations keep working afterwards, without eviction.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Eviction task ended abnormally");
            }
        }
    }

    /// Path of the entry file for `key`.
    pub fn entry_path(&self, key: &ContentKey) -> PathBuf {
        self.inner.entry_path(key)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // == Get ==
    /// Retrieves a live value.
    ///
    /// Expired or truncated entries count as misses and are removed in the
    /// background.
    pub async fn get(&self, key: &ContentKey) -> Option<Vec<u8>> {
        let path = self.inner.entry_path(key);

        match self.inner.read_entry(&path).await {
            ReadOutcome::Live(value) => {
                let size = entry_size(value.len());
                self.inner.counters.record_hit(size);

                let untracked = self.inner.index.lock().touch(*key);
                if untracked {
                    warn!(path = %path.display(), "Cache file was not tracked by the index");
                    self.inner.counters.adjust(size as i64, 1);
                }
                Some(value)
            }
            ReadOutcome::Missing => {
                self.inner.counters.record_miss();
                if self.inner.index.lock().remove(key) {
                    warn!(path = %path.display(), "Index referenced a cache file that no longer exists");
                }
                None
            }
            ReadOutcome::Stale => {
                self.inner.counters.record_miss();
                let inner = Arc::clone(&self.inner);
                let key = *key;
                tokio::spawn(async move {
                    inner.remove_entry(&key).await;
                });
                None
            }
            ReadOutcome::Unreadable => {
                self.inner.counters.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value, replacing any existing entry.
    ///
    /// A zero `ttl` keeps the entry for ten years, a negative one writes it
    /// already expired. Write failures are logged and leave the previous
    /// entry in place.
    pub async fn set(&self, key: &ContentKey, value: &[u8], ttl: Duration) {
        let path = self.inner.entry_path(key);
        let header = EntryHeader::from_ttl(ttl, Utc::now());
        let size = entry_size(value.len());

        let old_size = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };

        if let Err(err) = writer::write_entry(&path, header, value).await {
            error!(path = %path.display(), error = %err, "Failed to write cache file");
            return;
        }

        self.inner.counters.record_write(size);
        let (size_delta, count_delta) = match old_size {
            Some(old) => (size as i64 - old as i64, 0),
            None => (size as i64, 1),
        };
        let total = self.inner.counters.adjust(size_delta, count_delta);
        self.inner.index.lock().touch(*key);

        if total > self.inner.config.max_size_bytes as i64 {
            self.inner.trigger(EvictionPass::Exhausted);
        }
    }

    // == Remove ==
    /// Deletes an entry. Returns true if a file was removed.
    pub async fn remove(&self, key: &ContentKey) -> bool {
        self.inner.remove_entry(key).await
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    /// Number of keys in the recency index.
    pub fn tracked_len(&self) -> usize {
        self.inner.index.lock().len()
    }

    // == Namespacing ==
    /// Returns a view hashing `prefix` in front of every key.
    pub fn with_prefix(&self, prefix: impl Into<Vec<u8>>) -> PrefixedStore {
        PrefixedStore::new(self.clone(), prefix.into())
    }

    /// Memoization facade over a prefixed view.
    pub fn cache(&self, prefix: impl Into<Vec<u8>>) -> Cache<PrefixedStore> {
        Cache::new(self.with_prefix(prefix))
    }
}

// == Startup Scan ==
/// Walks the data root collecting entries and sweeping pending leftovers.
///
/// Only an unreadable root is an error; broken subdirectories are skipped.
async fn scan_data_dir(root: &Path) -> Result<Vec<ScannedEntry>> {
    let mut entries = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    let mut pending_swept = 0usize;

    while let Some(dir) = dirs.pop() {
        let mut listing = match fs::read_dir(&dir).await {
            Ok(listing) => listing,
            Err(err) if dir.as_path() == root => return Err(CacheError::io(root, err)),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Error while traversing cache data directory");
                continue;
            }
        };

        loop {
            let item = match listing.next_entry().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "Error while traversing cache data directory");
                    break;
                }
            };
            let path = item.path();
            let meta = match item.metadata().await {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to stat cache file");
                    continue;
                }
            };

            if meta.is_dir() {
                dirs.push(path);
                continue;
            }
            if is_pending(&path) {
                // leftover from an interrupted write
                let _ = fs::remove_file(&path).await;
                pending_swept += 1;
                continue;
            }

            let key = match path.file_name().and_then(|n| n.to_str()).and_then(ContentKey::from_hex) {
                Some(key) => key,
                None => {
                    warn!(path = %path.display(), "Invalid cache item name");
                    continue;
                }
            };

            entries.push(ScannedEntry {
                key,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }

    if pending_swept > 0 {
        debug!(count = pending_swept, "Removed leftover pending cache files");
    }
    Ok(entries)
}
