//! # Extension Traits
//!
//! Whole-file conveniences built on the session API.
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`exists`](FileSystemExt::exists) | Check if anything lives at a path |
//! | [`is_file`](FileSystemExt::is_file) | Check if path is a regular file |
//! | [`is_dir`](FileSystemExt::is_dir) | Check if path is a directory |
//! | [`file_size`](FileSystemExt::file_size) | Size of a file in bytes |
//! | [`read_to_end`](FileSystemExt::read_to_end) | Read a whole file |
//! | [`write_all`](FileSystemExt::write_all) | Replace a file's contents |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, `read_json` and `write_json` are
//! available through `FileSystemExtJson`.

use std::path::Path;

use crate::{File, FileSystem, FsError, OpenFlags};

/// Chunk size used by [`FileSystemExt::read_to_end`].
const READ_CHUNK: usize = 64 * 1024;

/// Extension methods for any [`FileSystem`].
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::{FileSystem, FileSystemExt, FsError};
/// use std::path::Path;
///
/// fn bump<F: FileSystem>(fs: &F, path: &Path) -> Result<u64, FsError> {
///     let mut data = if fs.is_file(path)? { fs.read_to_end(path)? } else { Vec::new() };
///     data.push(b'+');
///     fs.write_all(path, &data)?;
///     fs.file_size(path)
/// }
/// ```
pub trait FileSystemExt: FileSystem {
    /// Check if a file or directory exists at `path`.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a regular file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_file(&self, path: &Path) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(info) => Ok(info.is_file()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_dir(&self, path: &Path) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(info) => Ok(info.is_dir()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the size of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` if the path doesn't exist.
    fn file_size(&self, path: &Path) -> Result<u64, FsError> {
        Ok(self.stat(path)?.size)
    }

    /// Read the whole file at `path`.
    fn read_to_end(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        let mut file = self.open(path)?;
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        file.close()?;
        Ok(data)
    }

    /// Replace the contents of `path` with `data`, creating it and its
    /// parent directories if needed.
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let flags = OpenFlags {
            read: false,
            write: true,
            create: true,
            truncate: true,
            append: false,
        };
        let mut file = self.open_file(path, flags)?;
        let mut written = 0;
        while written < data.len() {
            match file.write(&data[written..])? {
                0 => {
                    return Err(FsError::Io {
                        operation: "write_all",
                        path: path.to_path_buf(),
                        source: std::io::ErrorKind::WriteZero.into(),
                    });
                }
                n => written += n,
            }
        }
        file.close()
    }
}

// Blanket implementation - any FileSystem gets FileSystemExt for free
impl<F: FileSystem + ?Sized> FileSystemExt for F {}

// =============================================================================
// JSON Support (Feature-Gated)
// =============================================================================

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON serialization extension methods.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait FileSystemExtJson: FileSystem {
        /// Read a file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound` if the file doesn't exist
        /// - `FsError::Deserialization` if JSON parsing failed
        fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, FsError> {
            let data = self.read_to_end(path)?;
            serde_json::from_slice(&data).map_err(|e| FsError::Deserialization(e.to_string()))
        }

        /// Serialize a value and write it as pretty-printed JSON.
        fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), FsError> {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| FsError::Serialization(e.to_string()))?;
            self.write_all(path, json.as_bytes())
        }
    }

    impl<F: FileSystem + ?Sized> FileSystemExtJson for F {}
}

#[cfg(feature = "serde")]
pub use json::FileSystemExtJson;
