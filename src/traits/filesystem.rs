//! Path-based filesystem operations.

use std::path::Path;
use std::time::SystemTime;

use crate::{File, FileInfo, FsError, OpenFlags, Permissions};

/// A blocking, path-based filesystem.
///
/// Paths are `/`-separated and relative to the filesystem root; a leading
/// separator is accepted and ignored.
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::{File, FileSystem, FsError};
/// use std::path::Path;
///
/// // Generic function that works with any FileSystem implementation
/// fn save<F: FileSystem>(fs: &F, data: &[u8]) -> Result<(), FsError> {
///     fs.mkdir_all(Path::new("archive/2024/"))?;
///     let mut file = fs.create(Path::new("archive/2024/log.bin"))?;
///     file.write(data)?;
///     file.close()
/// }
/// ```
pub trait FileSystem: Send + Sync {
    /// Session type returned when opening files.
    type File: File;

    /// Name of this filesystem.
    fn name(&self) -> &str;

    /// Open `path` for reading and writing, creating it and its parents.
    fn create(&self, path: &Path) -> Result<Self::File, FsError>;

    /// Create every directory named by `path` (which must end in `/`).
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `path` has no directory portion or does
    ///   not end in a separator
    fn mkdir(&self, path: &Path) -> Result<(), FsError>;

    /// Same as [`mkdir`](FileSystem::mkdir); creation is idempotent.
    fn mkdir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Open `path` read-only.
    fn open(&self, path: &Path) -> Result<Self::File, FsError>;

    /// Open `path` with explicit flags.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if a segment is missing and `create` is unset
    /// - [`FsError::InvalidPath`] if `path` ends in a separator and the flags
    ///   ask for writing
    fn open_file(&self, path: &Path, flags: OpenFlags) -> Result<Self::File, FsError>;

    /// Remove the file or directory at `path`.
    fn remove(&self, path: &Path) -> Result<(), FsError>;

    /// Remove `path` and everything below it.
    fn remove_all(&self, path: &Path) -> Result<(), FsError>;

    /// Rename an entry.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Describe the entry at `path`.
    fn stat(&self, path: &Path) -> Result<FileInfo, FsError>;

    /// Change permissions.
    fn chmod(&self, path: &Path, permissions: Permissions) -> Result<(), FsError>;

    /// Change ownership.
    fn chown(&self, path: &Path, uid: u32, gid: u32) -> Result<(), FsError>;

    /// Change access and modification times.
    fn chtimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime)
    -> Result<(), FsError>;
}
