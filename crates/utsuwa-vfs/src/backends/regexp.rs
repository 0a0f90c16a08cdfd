//! Name-filtering wrapper.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use regex::Regex;

use crate::error::{ErrorKind, Op, VfsError, VfsResult};
use crate::ops::{File, Fs};
use crate::path;
use crate::types::{FileAttr, FileMode, OpenFlags};

/// Hides every file whose leaf name does not match a pattern.
///
/// Hidden files behave as if absent. Directories are never hidden, so the
/// tree stays navigable.
#[derive(Debug, Clone)]
pub struct RegexFs {
    inner: Arc<dyn Fs>,
    pattern: Regex,
}

impl RegexFs {
    pub fn new(inner: Arc<dyn Fs>, pattern: Regex) -> Self {
        Self { inner, pattern }
    }

    fn matches(&self, path: &Path) -> bool {
        let clean = path::normalize(path);
        let name = path::split(&clean).map_or(path::ROOT, |(_, name)| name);
        self.pattern.is_match(name)
    }

    fn require_match(&self, op: Op, path: &Path) -> VfsResult<()> {
        if self.matches(path) {
            Ok(())
        } else {
            Err(VfsError::path(op, path, ErrorKind::NotExist))
        }
    }

    /// Directories pass; files must match.
    fn dir_or_match(&self, op: Op, path: &Path) -> VfsResult<()> {
        let attr = self
            .inner
            .stat(path)
            .map_err(|e| VfsError::path(op, path, e.kind()))?;
        if attr.is_dir() {
            return Ok(());
        }
        self.require_match(op, path)
    }
}

impl Fs for RegexFs {
    fn name(&self) -> &str {
        "RegexFs"
    }

    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.require_match(Op::Open, path)?;
        self.inner.create(path)
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.dir_or_match(Op::Open, path)?;
        self.inner.open(path)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode) -> VfsResult<Box<dyn File>> {
        match self.dir_or_match(Op::Open, path) {
            Ok(()) => {}
            Err(e) if e.is_not_exist() && flags.create => self.require_match(Op::Open, path)?,
            Err(e) => return Err(e),
        }
        self.inner.open_file(path, flags, mode)
    }

    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.inner.mkdir(path, mode)
    }

    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.inner.mkdir_all(path, mode)
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>> {
        let entries = self.inner.read_dir(path)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_dir() || self.pattern.is_match(&entry.name))
            .collect())
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        self.dir_or_match(Op::Remove, path)?;
        self.inner.remove(path)
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        match self.dir_or_match(Op::Remove, path) {
            Ok(()) => self.inner.remove_all(path),
            // Invisible or absent: nothing to do.
            Err(e) if e.is_not_exist() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        let link = |e: VfsError| VfsError::link(Op::Rename, old, new, e.kind());
        let attr = self.inner.stat(old).map_err(link)?;
        if !attr.is_dir() {
            self.require_match(Op::Rename, old).map_err(link)?;
            self.require_match(Op::Rename, new).map_err(link)?;
        }
        self.inner.rename(old, new)
    }

    fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        self.dir_or_match(Op::Stat, path)?;
        self.inner.stat(path)
    }

    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.dir_or_match(Op::Chmod, path)?;
        self.inner.chmod(path, mode)
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.dir_or_match(Op::Chtimes, path)?;
        self.inner.chtimes(path, atime, mtime)
    }
}
