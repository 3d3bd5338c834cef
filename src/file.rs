//! # File Sessions
//!
//! [`OpfsFile`] is one open file or directory.
//!
//! ## Lifecycle
//!
//! ```text
//! open_file ──▶ OpfsFile { cursor: 0, access: unacquired }
//!                 │ first read/write/seek(End)/truncate
//!                 ▼
//!               access: acquired ─┐    (or failed, permanently)
//!                 │ close / drop  │
//!                 ▼               │
//!               flush + release ◀─┘
//! ```
//!
//! The random-access handle is acquired lazily and at most once. A failed
//! acquisition is remembered: every later I/O call on the session reports
//! [`FsError::AccessHandle`] without retrying.

use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::bridge::{classify, settle};
use crate::readdir::DirectoryIterator;
use crate::storage::{
    AccessHandle, AccessMode, DirectoryHandle, EntryCursor, FileHandle, SyncAccessHandle,
};
use crate::{File, FileInfo, FileSystem, FsError, OpenFlags, OpfsFs};

/// What a session was opened on.
pub(crate) enum Target {
    File(FileHandle),
    Directory(DirectoryHandle),
}

/// An open file or directory on an [`OpfsFs`].
///
/// Not internally synchronized: the cursor is plain state mutated through
/// `&mut self`. Different sessions on the same path are independent, but the
/// storage decides whether a second exclusive access handle can be created.
///
/// Dropping an open session closes it.
pub struct OpfsFile {
    fs: OpfsFs,
    name: PathBuf,
    parent: DirectoryHandle,
    target: Target,
    access: OnceLock<Result<AccessHandle, String>>,
    entries: Option<Box<dyn EntryCursor>>,
    closed: bool,
    flags: OpenFlags,
    cursor: i64,
}

impl OpfsFile {
    pub(crate) fn new(
        fs: OpfsFs,
        name: PathBuf,
        parent: DirectoryHandle,
        target: Target,
        flags: OpenFlags,
    ) -> Self {
        Self {
            fs,
            name,
            parent,
            target,
            access: OnceLock::new(),
            entries: None,
            closed: false,
            flags,
            cursor: 0,
        }
    }

    /// Path the file was opened with.
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Returns `true` if this session was opened on a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.target, Target::Directory(_))
    }

    /// Flags the session was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        // The cursor is clamped at every update and never negative.
        self.cursor.unsigned_abs()
    }

    /// Returns `true` once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ------------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------------

    fn require_file(&self, operation: &'static str) -> Result<&FileHandle, FsError> {
        match &self.target {
            Target::File(file) => Ok(file),
            Target::Directory(_) => Err(FsError::InvalidOperation {
                path: self.name.clone(),
                operation,
            }),
        }
    }

    fn require_open(&self, operation: &'static str) -> Result<(), FsError> {
        if self.closed {
            return Err(FsError::Closed {
                path: self.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn require_writable(&self, operation: &'static str) -> Result<(), FsError> {
        if self.flags.is_read_only() {
            return Err(FsError::PermissionDenied {
                path: self.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    /// The random-access handle, acquired on first use.
    fn access(&self) -> Result<&dyn SyncAccessHandle, FsError> {
        let file = self.require_file("acquire")?;
        let slot = self.access.get_or_init(|| {
            let mode = if self.flags.is_read_only() && self.fs.config().shared_readers {
                AccessMode::ReadOnly
            } else {
                AccessMode::ReadWrite
            };
            let acquired = settle(file.create_sync_access_handle(mode), &self.name);
            debug!(
                target: "opfs::file",
                event = "acquire",
                path = %self.name.display(),
                mode = ?mode,
                ok = acquired.is_ok()
            );
            acquired.map_err(|error| error.to_string())
        });
        match slot {
            Ok(handle) => Ok(&**handle),
            Err(reason) => Err(FsError::AccessHandle {
                path: self.name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn invalid_seek(&self) -> FsError {
        FsError::InvalidSeek {
            path: self.name.clone(),
        }
    }

    fn advance(&mut self, n: usize) {
        self.cursor = self.cursor.saturating_add(i64::try_from(n).unwrap_or(i64::MAX));
    }

    // ------------------------------------------------------------------------
    // Byte I/O
    // ------------------------------------------------------------------------

    /// Read into `buf` at the cursor and advance it by the bytes read.
    ///
    /// Returns 0 at end of file.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory session
    /// - [`FsError::Closed`] after [`close`](Self::close)
    /// - [`FsError::PermissionDenied`] if opened write-only
    /// - [`FsError::AccessHandle`] if the access handle cannot be acquired
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        self.require_file("read")?;
        self.require_open("read")?;
        if self.flags.is_write_only() {
            return Err(FsError::PermissionDenied {
                path: self.name.clone(),
                operation: "read",
            });
        }
        let at = self.position();
        let n = self
            .access()?
            .read(buf, at)
            .map_err(|error| classify(error, &self.name))?;
        self.advance(n);
        Ok(n)
    }

    /// Seek to `offset` from the start, then [`read`](Self::read).
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    /// Write `buf` at the cursor and advance it by the bytes written.
    ///
    /// In append mode the cursor first moves to the end of the file.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory session
    /// - [`FsError::Closed`] after [`close`](Self::close)
    /// - [`FsError::PermissionDenied`] if opened read-only
    /// - [`FsError::AccessHandle`] if the access handle cannot be acquired
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        self.require_file("write")?;
        self.require_open("write")?;
        self.require_writable("write")?;
        if self.flags.append {
            self.seek(SeekFrom::End(0))?;
        }
        let at = self.position();
        let n = self
            .access()?
            .write(buf, at)
            .map_err(|error| classify(error, &self.name))?;
        self.advance(n);
        Ok(n)
    }

    /// Seek to `offset` from the start, then [`write`](Self::write).
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        self.seek(SeekFrom::Start(offset))?;
        self.write(buf)
    }

    /// Move the cursor and return its new position.
    ///
    /// Seeking from the end asks the storage for the current size, acquiring
    /// the access handle if needed. A target before the start clamps to 0.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory session
    /// - [`FsError::Closed`] after [`close`](Self::close)
    /// - [`FsError::InvalidSeek`] if the target overflows
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        self.require_file("seek")?;
        self.require_open("seek")?;
        let target = match pos {
            SeekFrom::Start(offset) => {
                i64::try_from(offset).map_err(|_| self.invalid_seek())?
            }
            SeekFrom::Current(offset) => self
                .cursor
                .checked_add(offset)
                .ok_or_else(|| self.invalid_seek())?,
            SeekFrom::End(offset) => {
                let size = self
                    .access()?
                    .get_size()
                    .map_err(|error| classify(error, &self.name))?;
                i64::try_from(size)
                    .ok()
                    .and_then(|size| size.checked_add(offset))
                    .ok_or_else(|| self.invalid_seek())?
            }
        };
        self.cursor = target.max(0);
        Ok(self.position())
    }

    /// Resize the file to `len` bytes. The cursor does not move.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a directory session
    /// - [`FsError::Closed`] after [`close`](Self::close)
    /// - [`FsError::PermissionDenied`] if opened read-only
    pub fn truncate(&mut self, len: u64) -> Result<(), FsError> {
        self.require_file("truncate")?;
        self.require_open("truncate")?;
        self.require_writable("truncate")?;
        self.access()?
            .truncate(len)
            .map_err(|error| classify(error, &self.name))
    }

    /// Flush the access handle, if one was acquired. No-op for directories.
    pub fn sync(&mut self) -> Result<(), FsError> {
        match self.access.get() {
            Some(Ok(handle)) => handle.flush().map_err(|error| classify(error, &self.name)),
            _ => Ok(()),
        }
    }

    /// Flush and release the access handle. Later calls are no-ops.
    ///
    /// The handle is released even if the flush fails; the flush error is
    /// still reported.
    pub fn close(&mut self) -> Result<(), FsError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.entries = None;
        let flushed = match self.access.take() {
            Some(Ok(handle)) => {
                let flushed = handle.flush();
                handle.close();
                flushed.map_err(|error| classify(error, &self.name))
            }
            _ => Ok(()),
        };
        debug!(target: "opfs::file", event = "close", path = %self.name.display());
        flushed
    }

    // ------------------------------------------------------------------------
    // Directory listing
    // ------------------------------------------------------------------------

    /// List up to `count` further entries; 0 lists every remaining entry.
    ///
    /// Successive calls continue where the previous one stopped. Once the
    /// directory is exhausted an empty list is returned.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a file session
    /// - [`FsError::Closed`] after [`close`](Self::close)
    pub fn readdir(&mut self, count: usize) -> Result<Vec<FileInfo>, FsError> {
        let dir = match &self.target {
            Target::Directory(dir) => dir,
            Target::File(_) => {
                return Err(FsError::InvalidOperation {
                    path: self.name.clone(),
                    operation: "readdir",
                });
            }
        };
        self.require_open("readdir")?;

        // The field is public, so a literal config can carry 0.
        let batch_size = self.fs.config().readdir_batch_size.max(1);
        let cursor = self.entries.get_or_insert_with(|| dir.entries());
        let mut iter = DirectoryIterator::new(&mut **cursor, &self.name);
        if count > 0 {
            return iter.next_batch(count);
        }

        let mut all = Vec::new();
        loop {
            let batch = iter.next_batch(batch_size)?;
            let done = batch.len() < batch_size;
            all.extend(batch);
            if done {
                return Ok(all);
            }
        }
    }

    /// Describe the entry this session was opened on.
    pub fn stat(&self) -> Result<FileInfo, FsError> {
        self.fs.stat(&self.name)
    }
}

impl Drop for OpfsFile {
    fn drop(&mut self) {
        if !self.closed {
            debug!(target: "opfs::file", event = "close_on_drop", path = %self.name.display());
            let _ = self.close();
        }
    }
}

impl fmt::Debug for OpfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpfsFile")
            .field("name", &self.name)
            .field("parent", &self.parent.name())
            .field("is_dir", &self.is_dir())
            .field("flags", &self.flags)
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl File for OpfsFile {
    fn name(&self) -> &Path {
        OpfsFile::name(self)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        OpfsFile::read(self, buf)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        OpfsFile::read_at(self, buf, offset)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        OpfsFile::write(self, buf)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        OpfsFile::write_at(self, buf, offset)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        OpfsFile::seek(self, pos)
    }

    fn close(&mut self) -> Result<(), FsError> {
        OpfsFile::close(self)
    }

    fn sync(&mut self) -> Result<(), FsError> {
        OpfsFile::sync(self)
    }

    fn truncate(&mut self, len: u64) -> Result<(), FsError> {
        OpfsFile::truncate(self, len)
    }

    fn readdir(&mut self, count: usize) -> Result<Vec<FileInfo>, FsError> {
        OpfsFile::readdir(self, count)
    }

    fn stat(&self) -> Result<FileInfo, FsError> {
        OpfsFile::stat(self)
    }
}

impl io::Read for OpfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        OpfsFile::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for OpfsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpfsFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        OpfsFile::sync(self).map_err(io::Error::from)
    }
}

impl io::Seek for OpfsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        OpfsFile::seek(self, pos).map_err(io::Error::from)
    }
}
