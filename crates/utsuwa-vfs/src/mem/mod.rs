//! In-memory filesystem engine.
//!
//! A [`MemoryFs`] owns one tree behind a reader/writer lock. Lookups share
//! the read side; anything that changes the shape of the tree (creating,
//! removing, renaming) takes the write side for its whole duration, so no
//! observer ever sees it half done. File content and attributes live behind
//! each node's own lock, and handles only ever touch that lock.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//! use std::path::Path;
//! use utsuwa_vfs::{File, Fs, MemoryFs};
//!
//! let fs = MemoryFs::new();
//! let mut f = fs.create(Path::new("/hello.txt")).unwrap();
//! f.write_all(b"hello").unwrap();
//! f.close().unwrap();
//!
//! assert_eq!(fs.read_all(Path::new("/hello.txt")).unwrap(), b"hello");
//! ```

mod dir_index;
mod file;
mod node;
mod tree;

pub use file::MemFile;

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use self::file::HandleCount;
use self::node::Node;
use self::tree::Tree;
use crate::config::MemFsConfig;
use crate::error::{ErrorKind, Op, VfsError, VfsResult};
use crate::ops::{DEFAULT_FILE_MODE, File, Fs};
use crate::path::{self, ROOT};
use crate::types::{FileAttr, FileMode, OpenFlags};

/// In-memory filesystem.
#[derive(Debug)]
pub struct MemoryFs {
    tree: RwLock<Tree>,
    config: MemFsConfig,
    handles: Arc<HandleCount>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem holding only the root directory.
    pub fn new() -> Self {
        Self::with_config(MemFsConfig::default())
    }

    pub fn with_config(config: MemFsConfig) -> Self {
        let handles = Arc::new(HandleCount::new(config.max_open_handles));
        Self {
            tree: RwLock::new(Tree::new()),
            config,
            handles,
        }
    }

    pub fn config(&self) -> &MemFsConfig {
        &self.config
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.handles.open()
    }

    /// Every path in the filesystem, sorted. Each one is also logged at
    /// debug level.
    pub fn list(&self) -> Vec<String> {
        let paths = self.tree.read().paths();
        for entry in &paths {
            tracing::debug!(fs = %self.config.name, path = %entry, "list");
        }
        paths
    }

    /// Disagreements between the path index and the directory links.
    /// Always empty unless the engine has a bug.
    pub fn inconsistencies(&self) -> Vec<String> {
        self.tree.read().inconsistencies()
    }

    fn open_node(&self, path: &Path, key: &str, flags: OpenFlags, mode: FileMode) -> VfsResult<MemFile> {
        let fail = |kind| VfsError::path(Op::Open, path, kind);

        let node = if flags.create {
            let mut tree = self.tree.write();
            match tree.lookup(key) {
                Ok(_) if flags.exclusive => return Err(fail(ErrorKind::Exist)),
                Ok(node) => node,
                Err(ErrorKind::NotExist) => {
                    let leaf = path::split(key).map_or(ROOT, |(_, name)| name);
                    let node = tree.insert(key, Node::file(leaf, mode)).map_err(fail)?;
                    tracing::debug!(path = %path.display(), mode = %node.attr().mode, "created file");
                    node
                }
                Err(kind) => return Err(fail(kind)),
            }
        } else {
            self.tree.read().lookup(key).map_err(fail)?
        };

        if node.is_dir() && (flags.writable() || flags.truncate) {
            return Err(fail(ErrorKind::IsDirectory));
        }
        if flags.truncate {
            let mut state = node.lock();
            state.set_len(0, None).map_err(fail)?;
            state.touch();
        }

        Ok(MemFile::new(
            node,
            path.to_string_lossy().into_owned(),
            flags,
            self.config.max_file_size,
            Arc::clone(&self.handles),
        ))
    }
}

impl Fs for MemoryFs {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.open_file(path, OpenFlags::create_truncate(), DEFAULT_FILE_MODE)
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.open_file(path, OpenFlags::read(), FileMode::default())
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode) -> VfsResult<Box<dyn File>> {
        flags.validate(path)?;
        let key = path::normalize(path);
        self.handles
            .acquire()
            .map_err(|kind| VfsError::path(Op::Open, path, kind))?;
        match self.open_node(path, &key, flags, mode) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) => {
                self.handles.release();
                Err(e)
            }
        }
    }

    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let key = path::normalize(path);
        let leaf = path::split(&key).map_or(ROOT, |(_, name)| name);
        self.tree
            .write()
            .insert(&key, Node::dir(leaf, mode))
            .map_err(|kind| VfsError::path(Op::Mkdir, path, kind))?;
        tracing::debug!(path = %path.display(), mode = %mode.dir_with_perm(), "mkdir");
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let key = path::normalize(path);
        self.tree
            .write()
            .mkdir_all(&key, mode)
            .map_err(|kind| VfsError::path(Op::Mkdir, path, kind))?;
        tracing::debug!(path = %path.display(), "mkdir_all");
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>> {
        let key = path::normalize(path);
        self.tree
            .read()
            .read_dir(&key)
            .map_err(|kind| VfsError::path(Op::ReadDir, path, kind))
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        let key = path::normalize(path);
        self.tree
            .write()
            .remove(&key, false)
            .map_err(|kind| VfsError::path(Op::Remove, path, kind))?;
        tracing::debug!(path = %path.display(), "removed");
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        let key = path::normalize(path);
        let mut tree = self.tree.write();
        let result = if key == ROOT {
            tree.clear()
        } else {
            tree.remove(&key, true)
        };
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed subtree");
                Ok(())
            }
            Err(ErrorKind::NotExist | ErrorKind::NotDirectory) => Ok(()),
            Err(kind) => Err(VfsError::path(Op::Remove, path, kind)),
        }
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        let old_key = path::normalize(old);
        let new_key = path::normalize(new);
        self.tree
            .write()
            .rename(&old_key, &new_key)
            .map_err(|kind| VfsError::link(Op::Rename, old, new, kind))?;
        tracing::debug!(old = %old.display(), new = %new.display(), "renamed");
        Ok(())
    }

    fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        let key = path::normalize(path);
        let node = self
            .tree
            .read()
            .lookup(&key)
            .map_err(|kind| VfsError::path(Op::Stat, path, kind))?;
        tracing::trace!(path = %path.display(), "stat");
        Ok(node.attr())
    }

    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let fail = |kind| VfsError::path(Op::Chmod, path, kind);
        let key = path::normalize(path);
        if key == ROOT {
            return Err(fail(ErrorKind::PermissionDenied));
        }
        let node = self.tree.read().lookup(&key).map_err(fail)?;
        let mut state = node.lock();
        state.mode = state.mode.chmod(mode);
        tracing::debug!(path = %path.display(), mode = %state.mode, "chmod");
        Ok(())
    }

    fn chtimes(&self, path: &Path, _atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        let key = path::normalize(path);
        let node = self
            .tree
            .read()
            .lookup(&key)
            .map_err(|kind| VfsError::path(Op::Chtimes, path, kind))?;
        node.lock().mtime = mtime;
        Ok(())
    }
}
