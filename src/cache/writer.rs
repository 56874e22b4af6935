//! Atomic Writer Module
//!
//! Publishes entry files through a `.pending` sibling and a rename, so a
//! reader never sees a partially written entry under its final name.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::cache::entry::EntryHeader;

/// Suffix of in-flight entry files.
pub const PENDING_EXT: &str = ".pending";

#[cfg(unix)]
const FILE_MODE: u32 = 0o640;
#[cfg(unix)]
const DIR_MODE: u32 = 0o750;

/// Returns `path` with `.pending` appended to its file name.
pub fn pending_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PENDING_EXT);
    PathBuf::from(name)
}

pub fn is_pending(path: &Path) -> bool {
    path.to_str()
        .map(|p| p.ends_with(PENDING_EXT))
        .unwrap_or(false)
}

// == Write Pending ==
/// Writes header and value into the pending sibling of `path` and syncs it.
///
/// On failure the pending file is deleted and whatever was published at
/// `path` stays untouched.
pub async fn write_pending(path: &Path, header: EntryHeader, value: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(parent).await?;
    }

    let pending = pending_path(path);
    let result = async {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let mut file = options.open(&pending).await?;
        file.write_all(&header.encode()).await?;
        file.write_all(value).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<_, io::Error>(())
    }
    .await;

    match result {
        Ok(()) => Ok(pending),
        Err(err) => {
            let _ = fs::remove_file(&pending).await;
            Err(err)
        }
    }
}

// == Publish ==
/// Renames a fully written pending file over its final path.
pub async fn publish(pending: &Path, path: &Path) -> io::Result<()> {
    if let Err(err) = fs::rename(pending, path).await {
        let _ = fs::remove_file(pending).await;
        return Err(err);
    }
    Ok(())
}

/// Writes an entry all-or-nothing.
pub async fn write_entry(path: &Path, header: EntryHeader, value: &[u8]) -> io::Result<()> {
    let pending = write_pending(path, header, value).await?;
    publish(&pending, path).await
}
