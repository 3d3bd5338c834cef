//! Core types for the OPFS filesystem adapter.

use std::time::{Duration, SystemTime};

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Immutable snapshot describing a file or directory.
///
/// The storage exposes no directory metadata, so directory snapshots always
/// report size 0 and [`SystemTime::UNIX_EPOCH`] as modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// Base name of the entry.
    pub name: String,
    /// Type of the entry.
    pub file_type: FileType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
}

impl FileInfo {
    /// Snapshot of a regular file.
    pub fn file(name: impl Into<String>, size: u64, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::File,
            size,
            modified,
        }
    }

    /// Synthesized snapshot of a directory.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Reported permissions. The storage has no permission model, so these
    /// are fixed per entry type.
    pub fn mode(&self) -> Permissions {
        match self.file_type {
            FileType::File => Permissions::default_file(),
            FileType::Directory => Permissions::default_dir(),
        }
    }
}

/// Convert a millisecond Unix timestamp, clamping negatives to the epoch.
pub(crate) fn time_from_millis(millis: i64) -> SystemTime {
    u64::try_from(millis)
        .map(|ms| SystemTime::UNIX_EPOCH + Duration::from_millis(ms))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Unix-style permissions stored as a mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permissions(u32);

impl Permissions {
    /// Create permissions from a Unix mode (e.g., 0o755).
    #[inline]
    pub const fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Get the raw mode value.
    #[inline]
    pub const fn mode(&self) -> u32 {
        self.0
    }

    /// Permissions reported for files (0o664 = rw-rw-r--).
    #[inline]
    pub const fn default_file() -> Self {
        Self(0o664)
    }

    /// Permissions reported for directories (0o755 = rwxr-xr-x).
    #[inline]
    pub const fn default_dir() -> Self {
        Self(0o755)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::default_file()
    }
}

/// Flags for opening a file.
///
/// A session is read-only when `write` is unset and write-only when `write`
/// is set without `read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file (and missing parent directories) if absent.
    pub create: bool,
    /// Truncate the file to zero length when opened for writing.
    pub truncate: bool,
    /// Every write goes to the current end of file.
    pub append: bool,
}

impl OpenFlags {
    /// Read-only access.
    pub const READ: Self = Self {
        read: true,
        write: false,
        create: false,
        truncate: false,
        append: false,
    };

    /// Write-only access with create and truncate.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: true,
        append: false,
    };

    /// Read and write access.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        create: false,
        truncate: false,
        append: false,
    };

    /// Read and write access, creating the file if absent.
    pub const CREATE: Self = Self {
        read: true,
        write: true,
        create: true,
        truncate: false,
        append: false,
    };

    /// Append mode - writes go to end of file.
    pub const APPEND: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: false,
        append: true,
    };

    /// Returns `true` if writes are forbidden.
    #[inline]
    pub const fn is_read_only(&self) -> bool {
        !self.write
    }

    /// Returns `true` if reads are forbidden.
    #[inline]
    pub const fn is_write_only(&self) -> bool {
        self.write && !self.read
    }
}

/// Serde support for SystemTime (when serde feature is enabled).
#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
