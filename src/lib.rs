//! # anyfs-opfs
//!
//! A **blocking, path-based filesystem** over storage that is asynchronous and
//! handle-centric, in the style of the browser's Origin Private File System.
//!
//! The storage never blocks and never addresses a file by a full path: it only
//! resolves one child of a directory handle at a time and reports completion
//! through callbacks. This crate hides all of that behind a conventional
//! `open`/`read`/`write`/`seek`/`stat`/`mkdir`/`remove` contract.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use anyfs_opfs::storage::memory::MemoryStorage;
//! use anyfs_opfs::{File, FileSystem, OpfsFs};
//! use std::io::SeekFrom;
//! use std::path::Path;
//!
//! let storage = MemoryStorage::new();
//! let fs = OpfsFs::new(&storage)?;
//!
//! fs.mkdir_all(Path::new("logs/2024/"))?;
//! let mut file = fs.create(Path::new("logs/2024/app.log"))?;
//! file.write(b"started\n")?;
//! file.seek(SeekFrom::Start(0))?;
//!
//! let mut buf = [0u8; 7];
//! file.read(&mut buf)?;
//! assert_eq!(&buf, b"started");
//! file.close()?;
//!
//! let names = fs.open(Path::new("logs/2024/"))?.readdirnames(0)?;
//! assert_eq!(names, vec!["app.log"]);
//! # Ok::<(), anyfs_opfs::FsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`OpfsFs`] | Path-based facade implementing [`FileSystem`] |
//! | [`OpfsFile`] | One open file or directory implementing [`File`] |
//! | [`FsError`] | Error type with path and operation context |
//! | [`FileInfo`] | Name, type, size and modification time of an entry |
//! | [`OpenFlags`] | Read/write/create/truncate/append mode of a session |
//! | [`FsConfig`] | Name, listing batch size, reader sharing |
//!
//! ---
//!
//! ## Layers
//!
//! ```text
//! OpfsFs ──▶ HandleResolver ──▶ OpfsFile / DirectoryIterator
//!                │                     │
//!                └──────── settle ◀────┘      (blocks on Pending<T>)
//!                            │
//!                            ▼
//!                  storage::{StorageDirectory, StorageFile, ...}
//! ```
//!
//! Every asynchronous storage call goes through [`bridge::settle`], which parks the
//! calling thread until one of the two completion callbacks fires. The caller
//! must therefore not be the thread that drives the storage's callbacks.
//!
//! ---
//!
//! ## Storage Backends
//!
//! The storage is consumed through the traits in [`storage`]. The bundled
//! [`MemoryStorage`](storage::memory::MemoryStorage) settles either inline or
//! on a dedicated event-loop thread.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for [`FileInfo`], [`OpenFlags`], [`FsConfig`], and `FileSystemExtJson` |

// Private modules
mod config;
mod error;
mod ext;
mod file;
mod fs;
mod readdir;
mod resolver;
mod traits;
mod types;

// Public modules
pub mod bridge;
pub mod storage;

// Public re-exports - error types
pub use error::FsError;

// Public re-exports - core types
pub use config::{DEFAULT_READDIR_BATCH_SIZE, FsConfig};
pub use types::{FileInfo, FileType, OpenFlags, Permissions};

// Public re-exports - contract
pub use traits::{File, FileSystem};

// Public re-exports - implementation
pub use file::OpfsFile;
pub use fs::OpfsFs;

// Public re-exports - infrastructure
pub use ext::FileSystemExt;

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::FileSystemExtJson;
