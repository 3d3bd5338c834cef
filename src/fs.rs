//! # Filesystem Facade
//!
//! [`OpfsFs`] composes the resolver, sessions and bridge into the
//! [`FileSystem`] contract.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::bridge::settle;
use crate::file::{OpfsFile, Target};
use crate::resolver::{self, Create, HandleResolver};
use crate::storage::{DirectoryHandle, StorageManager};
use crate::types::time_from_millis;
use crate::{FileInfo, FileSystem, FsConfig, FsError, OpenFlags, Permissions};

struct Inner {
    root: DirectoryHandle,
    config: FsConfig,
}

/// A blocking filesystem over handle-centric asynchronous storage.
///
/// Cheap to clone; clones share the root handle and configuration. Every
/// operation walks the path from the root again.
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::storage::memory::MemoryStorage;
/// use anyfs_opfs::{FileSystem, OpfsFs};
/// use std::io::{Read, Write};
/// use std::path::Path;
///
/// let storage = MemoryStorage::new();
/// let fs = OpfsFs::new(&storage)?;
///
/// let mut file = fs.create(Path::new("notes/today.txt"))?;
/// file.write_all(b"hello")?;
/// file.close()?;
///
/// let mut text = String::new();
/// fs.open(Path::new("notes/today.txt"))?.read_to_string(&mut text)?;
/// assert_eq!(text, "hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct OpfsFs {
    inner: Arc<Inner>,
}

impl OpfsFs {
    /// Open the storage root with the default configuration.
    ///
    /// # Errors
    ///
    /// Fails if the storage cannot provide its root directory.
    pub fn new(storage: &dyn StorageManager) -> Result<Self, FsError> {
        Self::with_config(storage, FsConfig::default())
    }

    /// Open the storage root with an explicit configuration.
    pub fn with_config(storage: &dyn StorageManager, config: FsConfig) -> Result<Self, FsError> {
        let root = settle(storage.get_directory(), Path::new("/"))?;
        debug!(target: "opfs::fs", event = "mount", name = %config.name);
        Ok(Self {
            inner: Arc::new(Inner { root, config }),
        })
    }

    /// The configuration this filesystem was built with.
    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    fn resolver(&self) -> HandleResolver<'_> {
        HandleResolver::new(&self.inner.root)
    }

    fn directory_session(
        &self,
        path: &Path,
        dir: DirectoryHandle,
        flags: OpenFlags,
    ) -> OpfsFile {
        OpfsFile::new(
            self.clone(),
            path.to_path_buf(),
            Arc::clone(&dir),
            Target::Directory(dir),
            flags,
        )
    }
}

impl std::fmt::Debug for OpfsFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpfsFs")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl FileSystem for OpfsFs {
    type File = OpfsFile;

    fn name(&self) -> &str {
        &self.inner.config.name
    }

    fn create(&self, path: &Path) -> Result<OpfsFile, FsError> {
        self.open_file(path, OpenFlags::CREATE)
    }

    fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        debug!(target: "opfs::fs", event = "mkdir", path = %path.display());
        let split = resolver::parse(path)?;
        if !split.has_dir || !split.name.is_empty() {
            return Err(FsError::InvalidPath {
                path: path.to_path_buf(),
                reason: "directory paths must end with a separator",
            });
        }
        self.resolver()
            .directory(&split.segments, Create::IfMissing)
            .map(|_| ())
    }

    fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        self.mkdir(path)
    }

    fn open(&self, path: &Path) -> Result<OpfsFile, FsError> {
        self.open_file(path, OpenFlags::READ)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags) -> Result<OpfsFile, FsError> {
        debug!(target: "opfs::fs", event = "open", path = %path.display(), flags = ?flags);
        let split = resolver::parse(path)?;
        let resolver = self.resolver();

        if split.name.is_empty() {
            if !flags.is_read_only() {
                return Err(FsError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "a file name is required for writing",
                });
            }
            let dir = resolver.directory(&split.segments, Create::Never)?;
            return Ok(self.directory_session(path, dir, flags));
        }

        let parent = resolver.directory(&split.segments, Create::from(flags.create))?;
        let file = match resolver.file(&parent, split.name, Create::from(flags.create), path) {
            Ok(file) => file,
            Err(error) if flags.is_read_only() && resolver::is_type_mismatch(&error) => {
                let dir = resolver.child_directory(&parent, split.name, path)?;
                return Ok(OpfsFile::new(
                    self.clone(),
                    path.to_path_buf(),
                    parent,
                    Target::Directory(dir),
                    flags,
                ));
            }
            Err(error) => return Err(error),
        };

        let mut session = OpfsFile::new(
            self.clone(),
            path.to_path_buf(),
            parent,
            Target::File(file),
            flags,
        );
        if flags.write && flags.truncate {
            session.truncate(0)?;
        }
        Ok(session)
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        debug!(target: "opfs::fs", event = "remove", path = %path.display());
        let split = resolver::parse(path)?;
        if split.name.is_empty() {
            return Err(FsError::InvalidPath {
                path: path.to_path_buf(),
                reason: "an entry name is required",
            });
        }
        let parent = self.resolver().directory(&split.segments, Create::Never)?;
        settle(parent.remove_entry(split.name, false), path)
    }

    fn remove_all(&self, path: &Path) -> Result<(), FsError> {
        debug!(target: "opfs::fs", event = "remove_all", path = %path.display());
        let raw = path.to_str().ok_or_else(|| FsError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8",
        })?;
        let split = resolver::parse(Path::new(raw.trim_end_matches('/')))?;
        if split.name.is_empty() {
            return Err(FsError::InvalidPath {
                path: path.to_path_buf(),
                reason: "cannot remove the root",
            });
        }
        let parent = self.resolver().directory(&split.segments, Create::Never)?;
        settle(parent.remove_entry(split.name, true), path)
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<(), FsError> {
        Err(FsError::NotSupported {
            operation: "rename",
        })
    }

    fn stat(&self, path: &Path) -> Result<FileInfo, FsError> {
        debug!(target: "opfs::fs", event = "stat", path = %path.display());
        let split = resolver::parse(path)?;
        if split.name.is_empty() {
            return Ok(FileInfo::directory(resolver::base_name(path)));
        }

        let resolver = self.resolver();
        let parent = resolver.directory(&split.segments, Create::Never)?;
        let file = match resolver.file(&parent, split.name, Create::Never, path) {
            Ok(file) => file,
            Err(error) if resolver::is_type_mismatch(&error) => {
                return Ok(FileInfo::directory(split.name));
            }
            Err(error) => return Err(error),
        };
        let snapshot = settle(file.get_file(), path)?;
        Ok(FileInfo::file(
            split.name,
            snapshot.size,
            time_from_millis(snapshot.last_modified_ms),
        ))
    }

    fn chmod(&self, _path: &Path, _permissions: Permissions) -> Result<(), FsError> {
        Err(FsError::NotSupported { operation: "chmod" })
    }

    fn chown(&self, _path: &Path, _uid: u32, _gid: u32) -> Result<(), FsError> {
        Err(FsError::NotSupported { operation: "chown" })
    }

    fn chtimes(
        &self,
        _path: &Path,
        _accessed: SystemTime,
        _modified: SystemTime,
    ) -> Result<(), FsError> {
        Err(FsError::NotSupported {
            operation: "chtimes",
        })
    }
}
