//! # Storage API
//!
//! The handle-centric, completion-based storage interface this crate adapts.
//!
//! ## Overview
//!
//! The storage never addresses anything by a full path. Callers start from a
//! root [`StorageDirectory`] and look up one child name at a time, optionally
//! creating it. Every lookup completes asynchronously through a [`Pending`]
//! value which settles by invoking exactly one of two callbacks.
//!
//! ```text
//! StorageManager ──get_directory()──▶ root
//! root ──get_directory_handle("a")──▶ a ──get_file_handle("b.txt")──▶ file
//! file ──create_sync_access_handle()──▶ SyncAccessHandle (read/write at offset)
//! ```
//!
//! The only synchronous surface is [`SyncAccessHandle`], whose methods return
//! immediately once the handle exists.
//!
//! ## Implementations
//!
//! - [`memory::MemoryStorage`]: in-memory tree, optionally settling every
//!   operation on a dedicated event-loop thread.

pub mod memory;

use std::fmt;
use std::sync::Arc;

/// Shared reference to a directory in the storage tree.
pub type DirectoryHandle = Arc<dyn StorageDirectory>;

/// Shared reference to a file in the storage tree.
pub type FileHandle = Arc<dyn StorageFile>;

/// Exclusive (or shared read-only) random-access handle to a file.
pub type AccessHandle = Box<dyn SyncAccessHandle>;

/// A one-shot completion callback.
pub type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

type Executor<T> = Box<dyn FnOnce(Callback<T>, Callback<StorageError>) + Send + 'static>;

// ============================================================================
// Errors
// ============================================================================

/// Category of a storage failure, parsed from the host error name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageErrorKind {
    /// The named entry does not exist.
    NotFound,
    /// The named entry exists but has the other kind (file vs directory).
    TypeMismatch,
    /// The entry is locked, e.g. by another access handle.
    NoModificationAllowed,
    /// The modification is not allowed, e.g. removing a non-empty directory.
    InvalidModification,
    /// The name is not a valid entry name.
    InvalidName,
    /// Any other failure.
    Other,
}

impl StorageErrorKind {
    /// Parse a host error name such as `"NotFoundError"`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "NotFoundError" => Self::NotFound,
            "TypeMismatchError" => Self::TypeMismatch,
            "NoModificationAllowedError" => Self::NoModificationAllowed,
            "InvalidModificationError" => Self::InvalidModification,
            "TypeError" => Self::InvalidName,
            _ => Self::Other,
        }
    }

    /// The host error name for this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotFound => "NotFoundError",
            Self::TypeMismatch => "TypeMismatchError",
            Self::NoModificationAllowed => "NoModificationAllowedError",
            Self::InvalidModification => "InvalidModificationError",
            Self::InvalidName => "TypeError",
            Self::Other => "Error",
        }
    }
}

/// Failure reported by the storage backend (the rejection payload).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", kind.name())]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
}

impl StorageError {
    /// Create an error of the given kind.
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an error from a host error name and message.
    pub fn from_host(name: &str, message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::from_name(name), message)
    }

    /// Shorthand for a [`StorageErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }

    /// The category of this failure.
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// The message reported by the backend.
    pub fn message(&self) -> &str {
        &self.message
    }
}


// ============================================================================
// Pending completions
// ============================================================================

/// A storage operation that settles later by calling one of two callbacks.
///
/// The executor receives the fulfillment and rejection callbacks when
/// [`then`](Pending::then) attaches them. It may call one of them right away,
/// or hand them to another thread (the host event loop) that calls one later.
/// Dropping both callbacks without calling either leaves the operation
/// unsettled.
pub struct Pending<T> {
    executor: Executor<T>,
}

impl<T: Send + 'static> Pending<T> {
    /// Create a pending operation from its executor.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Callback<T>, Callback<StorageError>) + Send + 'static,
    {
        Self {
            executor: Box::new(executor),
        }
    }

    /// An operation that fulfills with `value` as soon as callbacks attach.
    pub fn resolved(value: T) -> Self {
        Self::new(move |on_fulfilled, _| on_fulfilled(value))
    }

    /// An operation that rejects with `error` as soon as callbacks attach.
    pub fn rejected(error: StorageError) -> Self {
        Self::new(move |_, on_rejected| on_rejected(error))
    }

    /// An operation that settles with `result` as soon as callbacks attach.
    pub fn from_result(result: Result<T, StorageError>) -> Self {
        match result {
            Ok(value) => Self::resolved(value),
            Err(error) => Self::rejected(error),
        }
    }

    /// Attach the completion callbacks, starting the operation.
    pub fn then(self, on_fulfilled: Callback<T>, on_rejected: Callback<StorageError>) {
        (self.executor)(on_fulfilled, on_rejected)
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Requested access for a [`SyncAccessHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessMode {
    /// Shared read-only access; several may coexist.
    ReadOnly,
    /// Exclusive read-write access.
    ReadWrite,
}

/// Size and modification time of a file, fetched without an access handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Size in bytes.
    pub size: u64,
    /// Last modification, in milliseconds since the Unix epoch.
    pub last_modified_ms: i64,
}

/// Entry point into the storage tree.
pub trait StorageManager: Send + Sync {
    /// Obtain the root directory.
    fn get_directory(&self) -> Pending<DirectoryHandle>;
}

/// A directory in the storage tree.
pub trait StorageDirectory: Send + Sync {
    /// Name of this directory (empty for the root).
    fn name(&self) -> &str;

    /// Look up a child directory, creating it when `create` is set.
    ///
    /// Rejects with `NotFound` when absent and `create` is unset, and with
    /// `TypeMismatch` when `name` is a file.
    fn get_directory_handle(&self, name: &str, create: bool) -> Pending<DirectoryHandle>;

    /// Look up a child file, creating it empty when `create` is set.
    ///
    /// Rejects with `NotFound` when absent and `create` is unset, and with
    /// `TypeMismatch` when `name` is a directory.
    fn get_file_handle(&self, name: &str, create: bool) -> Pending<FileHandle>;

    /// Remove a child entry. Non-empty directories need `recursive`.
    fn remove_entry(&self, name: &str, recursive: bool) -> Pending<()>;

    /// Start a cursor over the entries of this directory.
    fn entries(&self) -> Box<dyn EntryCursor>;
}

/// A file in the storage tree.
pub trait StorageFile: Send + Sync {
    /// Name of this file.
    fn name(&self) -> &str;

    /// Create a random-access handle. Fails while a conflicting handle is open.
    fn create_sync_access_handle(&self, mode: AccessMode) -> Pending<AccessHandle>;

    /// Fetch size and modification time.
    fn get_file(&self) -> Pending<FileSnapshot>;
}

/// Synchronous random-access I/O on an open file.
pub trait SyncAccessHandle: Send + Sync {
    /// Read into `buf` starting at byte `at`. Returns 0 past the end.
    fn read(&self, buf: &mut [u8], at: u64) -> Result<usize, StorageError>;

    /// Write `buf` starting at byte `at`, growing the file as needed.
    fn write(&self, buf: &[u8], at: u64) -> Result<usize, StorageError>;

    /// Resize the file to `len` bytes.
    fn truncate(&self, len: u64) -> Result<(), StorageError>;

    /// Persist pending writes.
    fn flush(&self) -> Result<(), StorageError>;

    /// Release the handle and its lock.
    fn close(&self);

    /// Current size in bytes.
    fn get_size(&self) -> Result<u64, StorageError>;
}

/// Asynchronous cursor over the entries of a directory.
pub trait EntryCursor: Send {
    /// Advance the cursor. Fulfills with `None` once exhausted.
    fn next(&mut self) -> Pending<Option<StorageEntry>>;
}

/// One entry yielded by an [`EntryCursor`].
pub struct StorageEntry {
    /// Entry name (a single segment).
    pub name: String,
    /// Handle to the entry.
    pub handle: EntryHandle,
}

/// Handle carried by a [`StorageEntry`].
pub enum EntryHandle {
    /// A regular file.
    File(FileHandle),
    /// A directory.
    Directory(DirectoryHandle),
}
