//! Filesystem configuration.

/// Default number of entries fetched per batch when draining a directory.
pub const DEFAULT_READDIR_BATCH_SIZE: usize = 100;

/// Configuration for an [`OpfsFs`](crate::OpfsFs) instance.
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::FsConfig;
///
/// let config = FsConfig::default()
///     .with_name("scratch")
///     .with_readdir_batch_size(16)
///     .with_shared_readers(false);
/// assert_eq!(config.name, "scratch");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FsConfig {
    /// Name reported by [`FileSystem::name`](crate::FileSystem::name).
    pub name: String,
    /// Entries fetched per batch by `readdir(0)`.
    pub readdir_batch_size: usize,
    /// Let read-only sessions request shared read-only access handles.
    ///
    /// When unset, every session requests an exclusive read-write handle.
    pub shared_readers: bool,
}

impl FsConfig {
    /// Set the filesystem name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the batch size used when draining a directory. Zero is raised to one.
    pub fn with_readdir_batch_size(mut self, size: usize) -> Self {
        self.readdir_batch_size = size.max(1);
        self
    }

    /// Choose whether read-only sessions share read-only access handles.
    pub fn with_shared_readers(mut self, shared: bool) -> Self {
        self.shared_readers = shared;
        self
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            name: "opfs".to_string(),
            readdir_batch_size: DEFAULT_READDIR_BATCH_SIZE,
            shared_readers: true,
        }
    }
}
