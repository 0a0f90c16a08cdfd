//! Read-only wrapper.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{ErrorKind, Op, VfsError, VfsResult};
use crate::ops::{File, Fs};
use crate::types::{FileAttr, FileMode, OpenFlags};

/// Passes reads through to an inner filesystem and refuses everything else.
#[derive(Debug, Clone)]
pub struct ReadOnlyFs {
    inner: Arc<dyn Fs>,
}

impl ReadOnlyFs {
    pub fn new(inner: Arc<dyn Fs>) -> Self {
        Self { inner }
    }
}

fn denied<T>(op: Op, path: &Path) -> VfsResult<T> {
    Err(VfsError::path(op, path, ErrorKind::PermissionDenied))
}

impl Fs for ReadOnlyFs {
    fn name(&self) -> &str {
        "ReadOnlyFs"
    }

    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        denied(Op::Open, path)
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.inner.open(path)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode) -> VfsResult<Box<dyn File>> {
        if flags.mutates() {
            return denied(Op::Open, path);
        }
        self.inner.open_file(path, flags, mode)
    }

    fn mkdir(&self, path: &Path, _mode: FileMode) -> VfsResult<()> {
        denied(Op::Mkdir, path)
    }

    fn mkdir_all(&self, path: &Path, _mode: FileMode) -> VfsResult<()> {
        denied(Op::Mkdir, path)
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>> {
        self.inner.read_dir(path)
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        denied(Op::Remove, path)
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        denied(Op::Remove, path)
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        Err(VfsError::link(Op::Rename, old, new, ErrorKind::PermissionDenied))
    }

    fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        self.inner.stat(path)
    }

    fn chmod(&self, path: &Path, _mode: FileMode) -> VfsResult<()> {
        denied(Op::Chmod, path)
    }

    fn chtimes(&self, path: &Path, _atime: SystemTime, _mtime: SystemTime) -> VfsResult<()> {
        denied(Op::Chtimes, path)
    }
}
