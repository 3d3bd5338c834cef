//! # Filesystem Traits
//!
//! The conventional blocking filesystem contract this crate implements.
//!
//! ## Quick Reference
//!
//! | Trait | Scope | Operations |
//! |-------|-------|------------|
//! | [`FileSystem`] | Path-based | `create`, `open`, `open_file`, `mkdir[_all]`, `remove[_all]`, `stat`, `rename`, `chmod`, `chown`, `chtimes` |
//! | [`File`] | One open session | `read[_at]`, `write[_at]`, `seek`, `truncate`, `sync`, `close`, `readdir[names]`, `stat`, `write_string` |
//!
//! Code written against these traits runs unchanged on any implementation.

mod file;
mod filesystem;

pub use file::File;
pub use filesystem::FileSystem;
