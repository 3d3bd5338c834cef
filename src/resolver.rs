//! # Handle Resolver
//!
//! Resolves slash-delimited paths by walking the directory-handle tree one
//! segment at a time.
//!
//! ## Responsibility
//! - Split a path into its directory portion and final segment
//! - Walk directory segments from the root, creating them on demand
//! - Look up (or create) the leaf file handle
//!
//! The storage only answers "child of this directory by name", so every
//! operation starts again from the root: handles are never cached across
//! calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::FsError;
use crate::bridge::settle;
use crate::storage::{DirectoryHandle, FileHandle, StorageErrorKind};

/// Whether missing entries are created during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Create {
    /// Fail with not-found on the first missing segment.
    Never,
    /// Create every missing segment.
    IfMissing,
}

impl Create {
    fn enabled(self) -> bool {
        self == Create::IfMissing
    }
}

impl From<bool> for Create {
    fn from(create: bool) -> Self {
        if create { Create::IfMissing } else { Create::Never }
    }
}

/// A path split into directory segments and final segment.
#[derive(Debug)]
pub(crate) struct SplitPath<'p> {
    /// Non-empty directory segments, in order.
    pub segments: Vec<&'p str>,
    /// Final segment; empty when the path ends in a separator.
    pub name: &'p str,
    /// Whether the path had a directory portion at all.
    pub has_dir: bool,
}

/// Split `path` at its last separator.
///
/// The directory portion keeps the trailing separator: `"a/b/c"` splits into
/// `("a/b/", "c")` and `"a/b/"` into `("a/b/", "")`.
pub(crate) fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Parse `path` into segments, rejecting shapes the tree cannot address.
///
/// # Errors
///
/// - [`FsError::InvalidPath`] for non-UTF-8 paths and `..` segments
pub(crate) fn parse(path: &Path) -> Result<SplitPath<'_>, FsError> {
    let raw = path.to_str().ok_or_else(|| FsError::InvalidPath {
        path: path.to_path_buf(),
        reason: "path is not valid UTF-8",
    })?;
    let (dir, name) = split_path(raw);

    let mut segments = Vec::new();
    for segment in dir.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(parent_segment(path)),
            _ => segments.push(segment),
        }
    }
    let name = match name {
        "." => "",
        ".." => return Err(parent_segment(path)),
        _ => name,
    };

    Ok(SplitPath {
        segments,
        name,
        has_dir: !dir.is_empty(),
    })
}

fn parent_segment(path: &Path) -> FsError {
    FsError::InvalidPath {
        path: path.to_path_buf(),
        reason: "parent segments are not supported",
    }
}

/// Last non-empty segment of `path`, or `/` for the root.
pub(crate) fn base_name(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .last()
        .unwrap_or("/")
        .to_string()
}

/// Returns `true` if `error` reports that an entry exists with the other kind.
pub(crate) fn is_type_mismatch(error: &FsError) -> bool {
    error
        .storage_error()
        .is_some_and(|e| e.kind() == StorageErrorKind::TypeMismatch)
}

/// Walks paths from a root directory handle.
pub(crate) struct HandleResolver<'r> {
    root: &'r DirectoryHandle,
}

impl<'r> HandleResolver<'r> {
    pub(crate) fn new(root: &'r DirectoryHandle) -> Self {
        Self { root }
    }

    /// Resolve the directory reached by following `segments` from the root.
    ///
    /// Stops at the first segment that cannot be resolved.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] naming the missing prefix, when `create` is
    ///   [`Create::Never`]
    /// - [`FsError::Backend`] if a segment names a file
    pub(crate) fn directory(
        &self,
        segments: &[&str],
        create: Create,
    ) -> Result<DirectoryHandle, FsError> {
        let mut prefix = PathBuf::new();
        segments
            .iter()
            .try_fold(Arc::clone(self.root), |dir, segment| {
                prefix.push(segment);
                trace!(
                    target: "opfs::resolve",
                    event = "dir_segment",
                    segment = *segment,
                    create = create.enabled()
                );
                settle(dir.get_directory_handle(segment, create.enabled()), &prefix)
            })
    }

    /// Resolve the file `name` under `parent`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if absent and `create` is [`Create::Never`]
    /// - [`FsError::Backend`] with a type-mismatch source if `name` is a directory
    pub(crate) fn file(
        &self,
        parent: &DirectoryHandle,
        name: &str,
        create: Create,
        path: &Path,
    ) -> Result<FileHandle, FsError> {
        trace!(
            target: "opfs::resolve",
            event = "file_segment",
            entry = name,
            create = create.enabled()
        );
        settle(parent.get_file_handle(name, create.enabled()), path)
    }

    /// Resolve the directory `name` under `parent` without creating it.
    pub(crate) fn child_directory(
        &self,
        parent: &DirectoryHandle,
        name: &str,
        path: &Path,
    ) -> Result<DirectoryHandle, FsError> {
        settle(parent.get_directory_handle(name, false), path)
    }
}
