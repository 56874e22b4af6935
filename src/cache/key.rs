//! Content Key Module
//!
//! Derives the content-address of an entry and maps it to its sharded path.

use std::fmt;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

/// Digest width in bytes (SHA-1, 160 bits).
pub const KEY_SIZE: usize = 20;

// == Content Key ==
/// Fixed-width digest of `prefix || key`, used as the file identity of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Hashes a namespace prefix followed by the caller key.
    pub fn new(prefix: &[u8], key: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(prefix);
        hasher.update(key);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    /// Parses a 40 character hex file name back into a key.
    pub fn from_hex(name: &str) -> Option<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        hex::decode_to_slice(name, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    // == Path Mapping ==
    /// Returns `<root>/<hex[0..2]>/<hex[2..4]>/<hex>`.
    ///
    /// Two shard levels keep each directory at roughly 1/65536th of the entries.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        let name = self.to_hex();
        root.join(&name[0..2]).join(&name[2..4]).join(&name)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
