//! Synchronous, bounded batches over an asynchronous directory cursor.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use crate::bridge::settle;
use crate::storage::{EntryCursor, EntryHandle, StorageEntry};
use crate::types::time_from_millis;
use crate::{FileInfo, FsError};

/// Pulls entries from an [`EntryCursor`] and describes each as a [`FileInfo`].
///
/// Entries come back in whatever order the storage yields them.
pub(crate) struct DirectoryIterator<'c> {
    cursor: &'c mut dyn EntryCursor,
    path: &'c Path,
}

impl<'c> DirectoryIterator<'c> {
    pub(crate) fn new(cursor: &'c mut dyn EntryCursor, path: &'c Path) -> Self {
        Self { cursor, path }
    }

    /// Advance up to `limit` entries.
    ///
    /// An exhausted cursor yields a short (possibly empty) batch, not an error.
    ///
    /// # Errors
    ///
    /// Propagates a failure to advance the cursor. A failed metadata fetch for
    /// a single file does not fail the batch: that entry is reported with
    /// size 0 and the epoch as modification time.
    pub(crate) fn next_batch(&mut self, limit: usize) -> Result<Vec<FileInfo>, FsError> {
        let mut batch = Vec::with_capacity(limit.min(1024));
        while batch.len() < limit {
            match settle(self.cursor.next(), self.path)? {
                Some(entry) => batch.push(self.describe(entry)),
                None => break,
            }
        }
        Ok(batch)
    }

    fn describe(&self, entry: StorageEntry) -> FileInfo {
        match entry.handle {
            EntryHandle::Directory(_) => FileInfo::directory(entry.name),
            EntryHandle::File(file) => {
                let path: PathBuf = self.path.join(&entry.name);
                match settle(file.get_file(), &path) {
                    Ok(snapshot) => FileInfo::file(
                        entry.name,
                        snapshot.size,
                        time_from_millis(snapshot.last_modified_ms),
                    ),
                    Err(error) => {
                        warn!(
                            target: "opfs::readdir",
                            event = "metadata_fallback",
                            path = %path.display(),
                            error = %error
                        );
                        FileInfo::file(entry.name, 0, SystemTime::UNIX_EPOCH)
                    }
                }
            }
        }
    }
}
