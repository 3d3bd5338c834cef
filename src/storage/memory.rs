//! In-memory implementation of the storage API.
//!
//! [`MemoryStorage`] keeps a tree of named directory and file nodes and
//! follows the host storage semantics the adapter depends on:
//!
//! - lookups fail with `NotFound`, or `TypeMismatch` when the name has the
//!   other kind;
//! - a read-write access handle is exclusive, read-only handles are shared;
//! - removing a non-empty directory needs `recursive`;
//! - directory entries are yielded in name order.
//!
//! By default every [`Pending`] settles inline as soon as callbacks attach.
//! [`MemoryStorage::with_event_loop`] instead queues each settlement onto a
//! dedicated thread, the way a host event loop would deliver it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    AccessHandle, AccessMode, DirectoryHandle, EntryCursor, EntryHandle, FileHandle, FileSnapshot,
    Pending, StorageDirectory, StorageEntry, StorageError, StorageErrorKind, StorageFile,
    StorageManager, SyncAccessHandle,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Largest size a single file may reach, in bytes.
///
/// Writes or truncations past it fail with `QuotaExceededError`.
pub const MAX_FILE_SIZE: u64 = 1 << 30;

/// In-memory storage tree.
///
/// Cloning is cheap and yields another reference to the same tree.
///
/// # Example
///
/// ```rust
/// use anyfs_opfs::storage::memory::MemoryStorage;
/// use anyfs_opfs::{FileSystem, OpfsFs};
/// use std::path::Path;
///
/// let storage = MemoryStorage::new();
/// let fs = OpfsFs::new(&storage).unwrap();
/// fs.mkdir_all(Path::new("docs/")).unwrap();
/// assert!(storage.contains_dir("docs"));
/// ```
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
}

struct Shared {
    root: Arc<DirNode>,
    event_loop: Option<mpsc::Sender<Job>>,
}

struct DirNode {
    name: String,
    children: RwLock<BTreeMap<String, Node>>,
}

struct FileNode {
    name: String,
    state: Mutex<FileState>,
}

#[derive(Default)]
struct FileState {
    data: Vec<u8>,
    modified_ms: i64,
    readers: usize,
    writer: bool,
    flushes: usize,
    metadata_fails: bool,
}

#[derive(Clone)]
enum Node {
    File(Arc<FileNode>),
    Dir(Arc<DirNode>),
}

impl MemoryStorage {
    /// Create an empty tree whose operations settle inline.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an empty tree whose operations settle on a dedicated thread.
    ///
    /// The thread exits once the storage and every handle into it are dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn with_event_loop() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("opfs-event-loop".to_string())
            .spawn(move || {
                for job in rx {
                    job();
                }
            })?;
        Ok(Self::build(Some(tx)))
    }

    fn build(event_loop: Option<mpsc::Sender<Job>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: Arc::new(DirNode::new(String::new())),
                event_loop,
            }),
        }
    }

    /// Returns `true` if `path` names a directory.
    pub fn contains_dir(&self, path: &str) -> bool {
        matches!(self.lookup(path), Some(Node::Dir(_)))
    }

    /// Returns `true` if `path` names a file.
    pub fn contains_file(&self, path: &str) -> bool {
        matches!(self.lookup(path), Some(Node::File(_)))
    }

    /// Contents of the file at `path`.
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.file(path).map(|file| file.lock().data.clone())
    }

    /// Returns `true` while any access handle on the file at `path` is open.
    pub fn is_locked(&self, path: &str) -> bool {
        self.file(path).is_some_and(|file| {
            let state = file.lock();
            state.writer || state.readers > 0
        })
    }

    /// Number of flushes issued through access handles on the file at `path`.
    pub fn flush_count(&self, path: &str) -> usize {
        self.file(path).map_or(0, |file| file.lock().flushes)
    }

    /// Make metadata fetches for the file at `path` fail (or succeed again).
    ///
    /// Returns `false` if no such file exists.
    pub fn set_metadata_failure(&self, path: &str, fail: bool) -> bool {
        match self.file(path) {
            Some(file) => {
                file.lock().metadata_fails = fail;
                true
            }
            None => false,
        }
    }

    fn file(&self, path: &str) -> Option<Arc<FileNode>> {
        match self.lookup(path)? {
            Node::File(file) => Some(file),
            Node::Dir(_) => None,
        }
    }

    fn lookup(&self, path: &str) -> Option<Node> {
        let mut current = Node::Dir(Arc::clone(&self.shared.root));
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = match &current {
                Node::Dir(dir) => read_lock(&dir.children).get(segment).cloned(),
                Node::File(_) => None,
            };
            current = next?;
        }
        Some(current)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager for MemoryStorage {
    fn get_directory(&self) -> Pending<DirectoryHandle> {
        let shared = Arc::clone(&self.shared);
        let root = Arc::clone(&self.shared.root);
        self.shared
            .defer(move || Ok(MemoryDirectory::handle(root, shared)))
    }
}

impl Shared {
    fn defer<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    {
        match &self.event_loop {
            None => Pending::new(move |on_fulfilled, on_rejected| match op() {
                Ok(value) => on_fulfilled(value),
                Err(error) => on_rejected(error),
            }),
            Some(tx) => {
                let tx = tx.clone();
                Pending::new(move |on_fulfilled, on_rejected| {
                    let job: Job = Box::new(move || match op() {
                        Ok(value) => on_fulfilled(value),
                        Err(error) => on_rejected(error),
                    });
                    // A stopped loop drops the callbacks, leaving the
                    // operation unsettled.
                    let _ = tx.send(job);
                })
            }
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

impl DirNode {
    fn new(name: String) -> Self {
        Self {
            name,
            children: RwLock::new(BTreeMap::new()),
        }
    }
}

impl FileNode {
    fn new(name: String) -> Self {
        Self {
            name,
            state: Mutex::new(FileState {
                modified_ms: now_ms(),
                ..FileState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Node {
    fn into_handle(self, shared: &Arc<Shared>) -> EntryHandle {
        match self {
            Node::File(node) => EntryHandle::File(MemoryFile::handle(node, Arc::clone(shared))),
            Node::Dir(node) => {
                EntryHandle::Directory(MemoryDirectory::handle(node, Arc::clone(shared)))
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(StorageError::new(
            StorageErrorKind::InvalidName,
            format!("name is not allowed: {name:?}"),
        ));
    }
    Ok(())
}

fn not_found(name: &str) -> StorageError {
    StorageError::not_found(format!("entry not found: {name}"))
}

fn type_mismatch(name: &str) -> StorageError {
    StorageError::new(
        StorageErrorKind::TypeMismatch,
        format!("entry has the other kind: {name}"),
    )
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Directory handles
// ============================================================================

struct MemoryDirectory {
    node: Arc<DirNode>,
    shared: Arc<Shared>,
}

impl MemoryDirectory {
    fn handle(node: Arc<DirNode>, shared: Arc<Shared>) -> DirectoryHandle {
        Arc::new(Self { node, shared })
    }
}

impl StorageDirectory for MemoryDirectory {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn get_directory_handle(&self, name: &str, create: bool) -> Pending<DirectoryHandle> {
        let node = Arc::clone(&self.node);
        let shared = Arc::clone(&self.shared);
        let name = name.to_string();
        self.shared.defer(move || {
            validate_name(&name)?;
            let mut children = write_lock(&node.children);
            let child = match children.get(&name) {
                Some(Node::Dir(dir)) => Arc::clone(dir),
                Some(Node::File(_)) => return Err(type_mismatch(&name)),
                None if create => {
                    let dir = Arc::new(DirNode::new(name.clone()));
                    children.insert(name, Node::Dir(Arc::clone(&dir)));
                    dir
                }
                None => return Err(not_found(&name)),
            };
            Ok(MemoryDirectory::handle(child, shared))
        })
    }

    fn get_file_handle(&self, name: &str, create: bool) -> Pending<FileHandle> {
        let node = Arc::clone(&self.node);
        let shared = Arc::clone(&self.shared);
        let name = name.to_string();
        self.shared.defer(move || {
            validate_name(&name)?;
            let mut children = write_lock(&node.children);
            let child = match children.get(&name) {
                Some(Node::File(file)) => Arc::clone(file),
                Some(Node::Dir(_)) => return Err(type_mismatch(&name)),
                None if create => {
                    let file = Arc::new(FileNode::new(name.clone()));
                    children.insert(name, Node::File(Arc::clone(&file)));
                    file
                }
                None => return Err(not_found(&name)),
            };
            Ok(MemoryFile::handle(child, shared))
        })
    }

    fn remove_entry(&self, name: &str, recursive: bool) -> Pending<()> {
        let node = Arc::clone(&self.node);
        let name = name.to_string();
        self.shared.defer(move || {
            validate_name(&name)?;
            let mut children = write_lock(&node.children);
            match children.get(&name) {
                None => return Err(not_found(&name)),
                Some(Node::Dir(dir)) if !recursive && !read_lock(&dir.children).is_empty() => {
                    return Err(StorageError::new(
                        StorageErrorKind::InvalidModification,
                        format!("directory not empty: {name}"),
                    ));
                }
                Some(Node::File(file)) => {
                    let state = file.lock();
                    if state.writer || state.readers > 0 {
                        return Err(StorageError::new(
                            StorageErrorKind::NoModificationAllowed,
                            format!("file is locked: {name}"),
                        ));
                    }
                }
                Some(Node::Dir(_)) => {}
            }
            children.remove(&name);
            Ok(())
        })
    }

    fn entries(&self) -> Box<dyn EntryCursor> {
        Box::new(MemoryCursor {
            node: Arc::clone(&self.node),
            shared: Arc::clone(&self.shared),
            remaining: None,
        })
    }
}

struct MemoryCursor {
    node: Arc<DirNode>,
    shared: Arc<Shared>,
    remaining: Option<VecDeque<(String, Node)>>,
}

impl EntryCursor for MemoryCursor {
    fn next(&mut self) -> Pending<Option<StorageEntry>> {
        let node = &self.node;
        let remaining = self.remaining.get_or_insert_with(|| {
            read_lock(&node.children)
                .iter()
                .map(|(name, child)| (name.clone(), child.clone()))
                .collect()
        });
        let next = remaining.pop_front();
        let shared = Arc::clone(&self.shared);
        self.shared.defer(move || {
            Ok(next.map(|(name, child)| StorageEntry {
                name,
                handle: child.into_handle(&shared),
            }))
        })
    }
}

// ============================================================================
// File handles
// ============================================================================

struct MemoryFile {
    node: Arc<FileNode>,
    shared: Arc<Shared>,
}

impl MemoryFile {
    fn handle(node: Arc<FileNode>, shared: Arc<Shared>) -> FileHandle {
        Arc::new(Self { node, shared })
    }
}

impl StorageFile for MemoryFile {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn create_sync_access_handle(&self, mode: AccessMode) -> Pending<AccessHandle> {
        let node = Arc::clone(&self.node);
        self.shared.defer(move || {
            {
                let mut state = node.lock();
                let busy = match mode {
                    AccessMode::ReadWrite => state.writer || state.readers > 0,
                    AccessMode::ReadOnly => state.writer,
                };
                if busy {
                    return Err(StorageError::new(
                        StorageErrorKind::NoModificationAllowed,
                        format!("access handle already open: {}", node.name),
                    ));
                }
                match mode {
                    AccessMode::ReadWrite => state.writer = true,
                    AccessMode::ReadOnly => state.readers += 1,
                }
            }
            let handle: AccessHandle = Box::new(MemoryAccessHandle {
                node,
                mode,
                closed: AtomicBool::new(false),
            });
            Ok(handle)
        })
    }

    fn get_file(&self) -> Pending<FileSnapshot> {
        let node = Arc::clone(&self.node);
        self.shared.defer(move || {
            let state = node.lock();
            if state.metadata_fails {
                return Err(StorageError::from_host(
                    "NotReadableError",
                    format!("cannot read file: {}", node.name),
                ));
            }
            Ok(FileSnapshot {
                size: state.data.len() as u64,
                last_modified_ms: state.modified_ms,
            })
        })
    }
}

struct MemoryAccessHandle {
    node: Arc<FileNode>,
    mode: AccessMode,
    closed: AtomicBool,
}

impl MemoryAccessHandle {
    fn state(&self) -> Result<MutexGuard<'_, FileState>, StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::from_host(
                "InvalidStateError",
                format!("access handle is closed: {}", self.node.name),
            ));
        }
        Ok(self.node.lock())
    }

    fn writable(&self) -> Result<MutexGuard<'_, FileState>, StorageError> {
        if self.mode == AccessMode::ReadOnly {
            return Err(StorageError::new(
                StorageErrorKind::NoModificationAllowed,
                format!("access handle is read-only: {}", self.node.name),
            ));
        }
        self.state()
    }
}

fn quota_exceeded(name: &str) -> StorageError {
    StorageError::from_host(
        "QuotaExceededError",
        format!("file would exceed {MAX_FILE_SIZE} bytes: {name}"),
    )
}

fn within_quota(size: u64, name: &str) -> Result<usize, StorageError> {
    if size > MAX_FILE_SIZE {
        return Err(quota_exceeded(name));
    }
    offset(size)
}

fn offset(at: u64) -> Result<usize, StorageError> {
    usize::try_from(at).map_err(|_| StorageError::from_host("RangeError", "offset out of range"))
}

impl SyncAccessHandle for MemoryAccessHandle {
    fn read(&self, buf: &mut [u8], at: u64) -> Result<usize, StorageError> {
        let state = self.state()?;
        let start = offset(at)?;
        if start >= state.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        Ok(n)
    }

    fn write(&self, buf: &[u8], at: u64) -> Result<usize, StorageError> {
        let mut state = self.writable()?;
        let end = u64::try_from(buf.len())
            .ok()
            .and_then(|len| at.checked_add(len))
            .ok_or_else(|| quota_exceeded(&self.node.name))?;
        let end = within_quota(end, &self.node.name)?;
        let start = offset(at)?;
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(buf);
        state.modified_ms = now_ms();
        Ok(buf.len())
    }

    fn truncate(&self, len: u64) -> Result<(), StorageError> {
        let mut state = self.writable()?;
        let len = within_quota(len, &self.node.name)?;
        state.data.resize(len, 0);
        state.modified_ms = now_ms();
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        let mut state = self.state()?;
        state.flushes += 1;
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.node.lock();
        match self.mode {
            AccessMode::ReadWrite => state.writer = false,
            AccessMode::ReadOnly => state.readers = state.readers.saturating_sub(1),
        }
    }

    fn get_size(&self) -> Result<u64, StorageError> {
        Ok(self.state()?.data.len() as u64)
    }
}

impl Drop for MemoryAccessHandle {
    fn drop(&mut self) {
        self.close();
    }
}
