//! Integration tests exercising the public API end to end.
//!
//! These tests verify that:
//! 1. Data written through a session reads back intact after reopening
//! 2. Cursor, mode and lifecycle rules hold for every session
//! 3. Path walking creates parents only when asked
//! 4. Everything behaves the same when storage settles on another thread
//! 5. Custom storage backends plug in through the storage traits

use anyfs_opfs::storage::memory::MemoryStorage;
use anyfs_opfs::storage::{
    DirectoryHandle, EntryCursor, FileHandle, Pending, StorageDirectory, StorageEntry,
    StorageError, StorageErrorKind, StorageManager,
};
use anyfs_opfs::*;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

// =============================================================================
// Helpers
// =============================================================================

fn inline() -> (MemoryStorage, OpfsFs) {
    let storage = MemoryStorage::new();
    let fs = OpfsFs::new(&storage).unwrap();
    (storage, fs)
}

fn event_loop() -> (MemoryStorage, OpfsFs) {
    let storage = MemoryStorage::with_event_loop().unwrap();
    let fs = OpfsFs::new(&storage).unwrap();
    (storage, fs)
}

fn both_modes() -> Vec<(MemoryStorage, OpfsFs)> {
    vec![inline(), event_loop()]
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) % 256) as u8).collect()
}

fn read_all(file: &mut OpfsFile) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn round_trip_preserves_bytes() {
    for (_storage, fs) in both_modes() {
        for len in [0usize, 1, 4096, 1_000_000] {
            let path = format!("round/{len}.bin");
            let data = pattern(len);

            let mut file = fs.create(Path::new(&path)).unwrap();
            assert_eq!(file.write(&data).unwrap(), len);
            file.close().unwrap();

            let mut file = fs.open(Path::new(&path)).unwrap();
            assert_eq!(read_all(&mut file), data);
            file.close().unwrap();
        }
    }
}

#[test]
fn generic_code_runs_against_the_contract() {
    fn copy<F: FileSystem>(fs: &F, from: &Path, to: &Path) -> Result<usize, FsError> {
        let mut src = fs.open(from)?;
        let mut dst = fs.create(to)?;
        let mut buf = [0u8; 16];
        let mut total = 0;
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            total += dst.write(&buf[..n])?;
        }
        dst.close()?;
        src.close()?;
        Ok(total)
    }

    let (storage, fs) = inline();
    fs.write_all(Path::new("src.txt"), b"copied through the trait").unwrap();
    assert_eq!(
        copy(&fs, Path::new("src.txt"), Path::new("out/dst.txt")).unwrap(),
        24
    );
    assert_eq!(
        storage.file_contents("out/dst.txt").unwrap(),
        b"copied through the trait"
    );
}

// =============================================================================
// Cursor Rules
// =============================================================================

#[test]
fn cursor_advances_by_bytes_written() {
    let (storage, fs) = inline();
    let mut file = fs.create(Path::new("c.bin")).unwrap();
    let mut expected = 0u64;
    for size in [3usize, 0, 17, 1024, 5] {
        file.write(&pattern(size)).unwrap();
        expected += size as u64;
        assert_eq!(file.position(), expected);
    }
    assert_eq!(file.seek(SeekFrom::Start(0)).unwrap(), 0);
    file.close().unwrap();
    assert_eq!(
        storage.file_contents("c.bin").unwrap().len() as u64,
        expected
    );
}

#[test]
fn seek_before_start_clamps_to_zero() {
    let (_storage, fs) = inline();
    let mut file = fs.create(Path::new("s.bin")).unwrap();
    file.write(&pattern(50)).unwrap();
    assert_eq!(file.seek(SeekFrom::End(-100)).unwrap(), 0);
    assert_eq!(file.seek(SeekFrom::Current(-1)).unwrap(), 0);
    assert_eq!(file.seek(SeekFrom::End(-10)).unwrap(), 40);
}

#[test]
fn write_string_writes_utf8() {
    let (storage, fs) = inline();
    let mut file = fs.create(Path::new("w.txt")).unwrap();
    assert_eq!(file.write_string("grüße").unwrap(), "grüße".len());
    file.close().unwrap();
    assert_eq!(storage.file_contents("w.txt").unwrap(), "grüße".as_bytes());
}

// =============================================================================
// Mode Enforcement and Lifecycle
// =============================================================================

#[test]
fn read_only_sessions_never_mutate() {
    let (storage, fs) = inline();
    fs.write_all(Path::new("ro.txt"), b"keep").unwrap();

    let mut file = fs.open(Path::new("ro.txt")).unwrap();
    for _ in 0..3 {
        assert!(matches!(
            file.write(b"change"),
            Err(FsError::PermissionDenied { .. })
        ));
    }
    assert!(matches!(
        file.write_at(b"change", 0),
        Err(FsError::PermissionDenied { .. })
    ));
    file.close().unwrap();
    assert_eq!(storage.file_contents("ro.txt").unwrap(), b"keep");
}

#[test]
fn write_only_sessions_never_read() {
    let (_storage, fs) = inline();
    let mut file = fs.open_file(Path::new("wo.txt"), OpenFlags::WRITE).unwrap();
    file.write(b"abc").unwrap();
    let mut buf = [0u8; 3];
    assert!(matches!(
        file.read_at(&mut buf, 0),
        Err(FsError::PermissionDenied { .. })
    ));
}

#[test]
fn double_close_flushes_once() {
    let (storage, fs) = inline();
    let mut file = fs.create(Path::new("d.txt")).unwrap();
    file.write(b"x").unwrap();
    file.close().unwrap();
    file.close().unwrap();
    assert!(file.is_closed());
    assert_eq!(storage.flush_count("d.txt"), 1);
}

#[test]
fn closing_releases_the_exclusive_handle() {
    let (_storage, fs) = inline();
    let mut first = fs.create(Path::new("x.txt")).unwrap();
    first.write(b"1").unwrap();
    first.close().unwrap();

    let mut second = fs.open_file(Path::new("x.txt"), OpenFlags::READ_WRITE).unwrap();
    second.seek(SeekFrom::End(0)).unwrap();
    second.write(b"2").unwrap();
    second.close().unwrap();
    assert_eq!(fs.read_to_end(Path::new("x.txt")).unwrap(), b"12");
}

#[test]
fn contention_surfaces_as_acquisition_error() {
    let (_storage, fs) = inline();
    let mut writer = fs.create(Path::new("busy.txt")).unwrap();
    writer.write(b"held").unwrap();

    let mut reader = fs.open(Path::new("busy.txt")).unwrap();
    let mut buf = [0u8; 4];
    let err = reader.read(&mut buf).unwrap_err();
    assert!(matches!(err, FsError::AccessHandle { .. }));

    writer.close().unwrap();
    assert!(matches!(
        reader.read(&mut buf),
        Err(FsError::AccessHandle { .. })
    ));

    let mut fresh = fs.open(Path::new("busy.txt")).unwrap();
    assert_eq!(fresh.read(&mut buf).unwrap(), 4);
}

// =============================================================================
// Directories
// =============================================================================

#[test]
fn directory_sessions_only_list() {
    let (_storage, fs) = inline();
    fs.mkdir_all(Path::new("dir/")).unwrap();
    let mut dir = fs.open(Path::new("dir")).unwrap();
    let mut buf = [0u8; 4];
    assert!(matches!(
        dir.read(&mut buf),
        Err(FsError::InvalidOperation { .. })
    ));
    assert!(matches!(
        dir.write(b"x"),
        Err(FsError::InvalidOperation { .. })
    ));
    assert!(matches!(
        dir.seek(SeekFrom::End(0)),
        Err(FsError::InvalidOperation { .. })
    ));
    assert!(matches!(
        dir.truncate(0),
        Err(FsError::InvalidOperation { .. })
    ));
    assert!(dir.readdir(0).unwrap().is_empty());

    let mut file = fs.create(Path::new("dir/f")).unwrap();
    assert!(matches!(
        file.readdir(1),
        Err(FsError::InvalidOperation { .. })
    ));
    assert!(matches!(
        file.readdirnames(0),
        Err(FsError::InvalidOperation { .. })
    ));
}

#[test]
fn listing_reports_files_and_directories() {
    for (_storage, fs) in both_modes() {
        fs.write_all(Path::new("tree/one.txt"), b"1").unwrap();
        fs.write_all(Path::new("tree/two.txt"), b"22").unwrap();
        fs.mkdir(Path::new("tree/nested/")).unwrap();

        let mut entries = fs.open(Path::new("tree/")).unwrap().readdir(0).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.is_dir(), e.size))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("nested", true, 0),
                ("one.txt", false, 1),
                ("two.txt", false, 2)
            ]
        );
        let nested = &entries[0];
        assert_eq!(nested.modified, SystemTime::UNIX_EPOCH);
        assert_eq!(nested.mode().mode(), 0o755);
        assert_eq!(entries[1].mode().mode(), 0o664);
    }
}

#[test]
fn listing_falls_back_when_metadata_fails() {
    let (storage, fs) = inline();
    fs.write_all(Path::new("l/good"), b"12345").unwrap();
    fs.write_all(Path::new("l/bad"), b"12345").unwrap();
    assert!(storage.set_metadata_failure("l/bad", true));

    let entries = fs.open(Path::new("l")).unwrap().readdir(0).unwrap();
    assert_eq!(entries.len(), 2);
    let bad = entries.iter().find(|e| e.name == "bad").unwrap();
    assert_eq!(bad.size, 0);
    assert_eq!(bad.modified, SystemTime::UNIX_EPOCH);
    let good = entries.iter().find(|e| e.name == "good").unwrap();
    assert_eq!(good.size, 5);
}

#[test]
fn root_can_be_listed() {
    let (_storage, fs) = inline();
    fs.write_all(Path::new("top.txt"), b"").unwrap();
    let names = fs.open(Path::new("/")).unwrap().readdirnames(0).unwrap();
    assert_eq!(names, vec!["top.txt"]);
    assert!(fs.stat(Path::new("/")).unwrap().is_dir());
}

// =============================================================================
// Path Walking
// =============================================================================

#[test]
fn parents_are_created_only_when_asked() {
    for (storage, fs) in both_modes() {
        let path = Path::new("a/b/c");
        let flags = OpenFlags {
            read: true,
            write: true,
            create: false,
            truncate: false,
            append: false,
        };
        assert!(matches!(
            fs.open_file(path, flags),
            Err(FsError::NotFound { .. })
        ));
        assert!(!storage.contains_dir("a"));

        let flags = OpenFlags {
            create: true,
            ..flags
        };
        fs.open_file(path, flags).unwrap().close().unwrap();
        assert!(storage.contains_dir("a"));
        assert!(storage.contains_dir("a/b"));
        assert!(storage.contains_file("a/b/c"));
    }
}

#[test]
fn leading_and_repeated_separators_are_ignored() {
    let (storage, fs) = inline();
    fs.write_all(Path::new("//x/./y//z.txt"), b"ok").unwrap();
    assert!(storage.contains_file("x/y/z.txt"));
    assert_eq!(fs.read_to_end(Path::new("/x/y/z.txt")).unwrap(), b"ok");
}

#[test]
fn parent_segments_are_rejected() {
    let (_storage, fs) = inline();
    assert!(matches!(
        fs.create(Path::new("a/../b")),
        Err(FsError::InvalidPath { .. })
    ));
    assert!(matches!(
        fs.stat(Path::new("..")),
        Err(FsError::InvalidPath { .. })
    ));
}

#[test]
fn file_in_place_of_directory_is_a_backend_error() {
    let (_storage, fs) = inline();
    fs.write_all(Path::new("plain"), b"").unwrap();
    let err = fs.create(Path::new("plain/child")).unwrap_err();
    assert!(matches!(err, FsError::Backend { .. }));
    let io_err: std::io::Error = err.into();
    assert_eq!(io_err.kind(), std::io::ErrorKind::Other);
}

#[test]
fn creating_a_file_over_a_directory_is_a_type_mismatch() {
    for (storage, fs) in both_modes() {
        fs.mkdir(Path::new("d/")).unwrap();
        let err = fs.open_file(Path::new("d"), OpenFlags::CREATE).unwrap_err();
        assert!(matches!(err, FsError::Backend { .. }));
        assert_eq!(
            err.storage_error().map(StorageError::kind),
            Some(StorageErrorKind::TypeMismatch)
        );
        assert!(storage.contains_dir("d"));
        assert!(!storage.contains_file("d"));
    }
}

#[test]
fn remove_all_takes_the_subtree() {
    let (storage, fs) = inline();
    fs.write_all(Path::new("gone/a/1"), b"1").unwrap();
    fs.write_all(Path::new("gone/b/2"), b"2").unwrap();
    fs.write_all(Path::new("kept"), b"3").unwrap();
    fs.remove_all(Path::new("gone")).unwrap();
    assert!(!storage.contains_dir("gone"));
    assert!(storage.contains_file("kept"));
    assert!(matches!(
        fs.remove(Path::new("gone")),
        Err(FsError::NotFound { .. })
    ));
}

// =============================================================================
// Unsupported Operations
// =============================================================================

#[test]
fn unsupported_operations_have_no_side_effects() {
    let (storage, fs) = inline();
    fs.write_all(Path::new("u.txt"), b"same").unwrap();
    let now = SystemTime::now();

    let results = [
        fs.rename(Path::new("u.txt"), Path::new("v.txt")),
        fs.chmod(Path::new("u.txt"), Permissions::from_mode(0o600)),
        fs.chown(Path::new("u.txt"), 1000, 1000),
        fs.chtimes(Path::new("u.txt"), now, now),
    ];
    for result in results {
        assert!(matches!(result, Err(FsError::NotSupported { .. })));
    }
    assert!(storage.contains_file("u.txt"));
    assert!(!storage.contains_file("v.txt"));
    assert_eq!(storage.file_contents("u.txt").unwrap(), b"same");
    assert_eq!(fs.stat(Path::new("u.txt")).unwrap().mode().mode(), 0o664);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn independent_sessions_on_many_threads() {
    let (storage, fs) = event_loop();
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || {
                let path = format!("t/{i}.bin");
                let data = pattern(1000 + i);
                fs.write_all(Path::new(&path), &data).unwrap();
                assert_eq!(fs.read_to_end(Path::new(&path)).unwrap(), data);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    for i in 0..8 {
        assert!(storage.contains_file(&format!("t/{i}.bin")));
    }
}

// =============================================================================
// Custom Storage
// =============================================================================

/// Storage whose operations never settle: every callback is dropped.
struct SilentStorage;

impl StorageManager for SilentStorage {
    fn get_directory(&self) -> Pending<DirectoryHandle> {
        Pending::new(|_on_fulfilled, _on_rejected| {})
    }
}

#[test]
fn storage_that_never_settles_reports_unsettled() {
    let err = OpfsFs::new(&SilentStorage).unwrap_err();
    assert!(matches!(err, FsError::Unsettled { .. }));
}

/// A root directory that rejects every lookup with a host error name.
struct LockedRoot;

impl StorageDirectory for LockedRoot {
    fn name(&self) -> &str {
        ""
    }

    fn get_directory_handle(&self, _name: &str, _create: bool) -> Pending<DirectoryHandle> {
        Pending::rejected(StorageError::from_host("SecurityError", "denied"))
    }

    fn get_file_handle(&self, _name: &str, _create: bool) -> Pending<FileHandle> {
        Pending::rejected(StorageError::from_host("SecurityError", "denied"))
    }

    fn remove_entry(&self, _name: &str, _recursive: bool) -> Pending<()> {
        Pending::rejected(StorageError::from_host("NotFoundError", "nothing here"))
    }

    fn entries(&self) -> Box<dyn EntryCursor> {
        Box::new(EmptyCursor)
    }
}

struct EmptyCursor;

impl EntryCursor for EmptyCursor {
    fn next(&mut self) -> Pending<Option<StorageEntry>> {
        Pending::resolved(None)
    }
}

struct LockedStorage;

impl StorageManager for LockedStorage {
    fn get_directory(&self) -> Pending<DirectoryHandle> {
        let root: DirectoryHandle = Arc::new(LockedRoot);
        Pending::resolved(root)
    }
}

#[test]
fn custom_backend_errors_keep_their_message() {
    let fs = OpfsFs::new(&LockedStorage).unwrap();
    let err = fs.open(Path::new("secret.txt")).unwrap_err();
    let source = err.storage_error().unwrap();
    assert_eq!(source.message(), "denied");
    assert!(err.to_string().contains("secret.txt"));

    assert!(matches!(
        fs.remove(Path::new("x")),
        Err(FsError::NotFound { .. })
    ));
    assert!(fs.open(Path::new("/")).unwrap().readdir(0).unwrap().is_empty());
}

#[test]
fn settle_blocks_on_any_pending_operation() {
    assert_eq!(bridge::settle(Pending::resolved(7u32), Path::new("/")).unwrap(), 7);

    let rejected: Pending<u32> =
        Pending::rejected(StorageError::from_host("NotFoundError", "gone"));
    assert!(matches!(
        bridge::settle(rejected, Path::new("missing")),
        Err(FsError::NotFound { .. })
    ));

    let late = Pending::<&'static str>::new(|on_fulfilled, _on_rejected| {
        thread::spawn(move || on_fulfilled("from another thread"));
    });
    assert_eq!(
        bridge::settle(late, Path::new("/")).unwrap(),
        "from another thread"
    );
}
