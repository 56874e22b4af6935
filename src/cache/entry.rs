//! Cache Entry Module
//!
//! Defines the on-disk entry header and its TTL handling.
//!
//! An entry file is an 8-byte little-endian expiration timestamp (Unix
//! seconds) followed by the raw value bytes.

use chrono::{DateTime, Duration, Utc};

/// Length of the expiration header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Lifetime used for a zero TTL.
pub fn permanent_ttl() -> Duration {
    Duration::days(365 * 10)
}

// == Entry Header ==
/// Expiration header stored at the start of every entry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Expiration timestamp (Unix seconds). 0 never expires.
    pub expires_at: i64,
}

impl EntryHeader {
    // == Constructor ==
    /// Computes the header for a value written at `now` with the given TTL.
    ///
    /// # Arguments
    /// * `ttl` - Zero means ten years, negative means already expired
    /// * `now` - Write time
    pub fn from_ttl(ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = if ttl < Duration::zero() {
            now.timestamp() - 1
        } else {
            let ttl = if ttl.is_zero() { permanent_ttl() } else { ttl };
            expiry_after(now, ttl)
        };

        Self { expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry stays live through its expiration second and is stale once
    /// `now` is strictly past it. A zero timestamp never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.expires_at == 0 {
            return false;
        }
        match DateTime::<Utc>::from_timestamp(self.expires_at, 0) {
            Some(expires) => now > expires,
            None => true,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        self.expires_at.to_le_bytes()
    }

    /// Returns `None` when fewer than `HEADER_SIZE` bytes are available.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self {
            expires_at: i64::from_le_bytes(raw),
        })
    }
}

/// Whole second at or after `now + ttl`, saturating at the latest
/// representable instant.
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> i64 {
    let latest = DateTime::<Utc>::MAX_UTC.timestamp();
    match now.checked_add_signed(ttl) {
        // round up so the entry lives at least `ttl`
        Some(expires) if expires.timestamp_subsec_nanos() > 0 => {
            expires.timestamp().saturating_add(1).min(latest)
        }
        Some(expires) => expires.timestamp(),
        None => latest,
    }
}

/// Size of an entry file holding `value_len` bytes.
pub fn entry_size(value_len: usize) -> u64 {
    (value_len + HEADER_SIZE) as u64
}
