//! Operations on an open file or directory.

use std::io::SeekFrom;
use std::path::Path;

use crate::{FileInfo, FsError};

/// An open file (or directory) returned by a [`FileSystem`](crate::FileSystem).
///
/// Sessions keep a cursor that [`read`](File::read), [`write`](File::write)
/// and [`seek`](File::seek) move. They are not meant to be shared between
/// threads without external synchronization, which is why every mutating
/// method takes `&mut self`.
///
/// Directory sessions only support listing; file sessions reject listing.
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::{File, FsError};
///
/// fn copy_all<S: File, D: File>(src: &mut S, dst: &mut D) -> Result<u64, FsError> {
///     let mut buf = [0u8; 4096];
///     let mut total = 0;
///     loop {
///         let n = src.read(&mut buf)?;
///         if n == 0 {
///             return Ok(total);
///         }
///         dst.write(&buf[..n])?;
///         total += n as u64;
///     }
/// }
/// ```
pub trait File: Send {
    /// Path the file was opened with.
    fn name(&self) -> &Path;

    /// Read into `buf` at the cursor and advance it. Returns 0 at end of file.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory
    /// - [`FsError::Closed`] after [`close`](File::close)
    /// - [`FsError::PermissionDenied`] if opened write-only
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Seek to `offset` from the start, then [`read`](File::read).
    ///
    /// The cursor stays where the read left it.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;

    /// Write `buf` at the cursor and advance it.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory
    /// - [`FsError::Closed`] after [`close`](File::close)
    /// - [`FsError::PermissionDenied`] if opened read-only
    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError>;

    /// Seek to `offset` from the start, then [`write`](File::write).
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FsError>;

    /// Move the cursor. Targets before the start clamp to 0.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError>;

    /// Flush and release the file. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), FsError>;

    /// Flush pending writes, if any I/O happened.
    fn sync(&mut self) -> Result<(), FsError>;

    /// Resize the file to `len` bytes.
    fn truncate(&mut self, len: u64) -> Result<(), FsError>;

    /// List up to `count` further entries of a directory; 0 lists all that remain.
    fn readdir(&mut self, count: usize) -> Result<Vec<FileInfo>, FsError>;

    /// Like [`readdir`](File::readdir), returning only the names.
    fn readdirnames(&mut self, count: usize) -> Result<Vec<String>, FsError> {
        Ok(self
            .readdir(count)?
            .into_iter()
            .map(|info| info.name)
            .collect())
    }

    /// Describe the file this session was opened on.
    fn stat(&self) -> Result<FileInfo, FsError>;

    /// Write a UTF-8 string at the cursor.
    fn write_string(&mut self, s: &str) -> Result<usize, FsError> {
        self.write(s.as_bytes())
    }
}
