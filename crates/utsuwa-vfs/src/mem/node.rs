//! Storage unit of the in-memory engine.

use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, MutexGuard};

use super::dir_index::DirIndex;
use crate::error::ErrorKind;
use crate::types::{FileAttr, FileMode, FileType};

/// Slot of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub usize);

/// A file or directory.
///
/// The kind is fixed at creation. Everything else sits behind the node's own
/// lock, so I/O on different files never contends.
#[derive(Debug)]
pub(crate) struct Node {
    kind: FileType,
    state: Mutex<NodeState>,
}

#[derive(Debug)]
pub(crate) struct NodeState {
    /// Leaf name; `/` for the root.
    pub name: String,
    pub mode: FileMode,
    pub mtime: SystemTime,
    /// Handles open for writing.
    pub writers: usize,
    pub body: Body,
}

/// Content of a file or children of a directory, never both.
#[derive(Debug)]
pub(crate) enum Body {
    File(Vec<u8>),
    Dir(DirIndex),
}

impl Node {
    /// New file; only the permission bits of `mode` are kept.
    pub fn file(name: &str, mode: FileMode) -> Self {
        Self::with_body(FileType::File, name, mode.file_with_perm(), Body::File(Vec::new()))
    }

    /// New directory; the directory bit is forced on.
    pub fn dir(name: &str, mode: FileMode) -> Self {
        Self::with_body(
            FileType::Directory,
            name,
            mode.dir_with_perm(),
            Body::Dir(DirIndex::new()),
        )
    }

    fn with_body(kind: FileType, name: &str, mode: FileMode, body: Body) -> Self {
        Self {
            kind,
            state: Mutex::new(NodeState {
                name: name.to_string(),
                mode,
                mtime: SystemTime::now(),
                writers: 0,
                body,
            }),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    pub fn attr(&self) -> FileAttr {
        self.lock().attr(self.kind)
    }
}

impl NodeState {
    pub fn attr(&self, kind: FileType) -> FileAttr {
        FileAttr {
            name: self.name.clone(),
            size: self.size(),
            mode: self.mode,
            mtime: self.mtime,
            kind,
        }
    }

    pub fn size(&self) -> u64 {
        match &self.body {
            Body::File(data) => data.len() as u64,
            Body::Dir(_) => 0,
        }
    }

    pub fn children(&self) -> Option<&DirIndex> {
        match &self.body {
            Body::Dir(children) => Some(children),
            Body::File(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut DirIndex> {
        match &mut self.body {
            Body::Dir(children) => Some(children),
            Body::File(_) => None,
        }
    }

    /// Stamp the modification time, strictly later than the current one.
    pub fn touch(&mut self) {
        let now = SystemTime::now();
        self.mtime = if now > self.mtime {
            now
        } else {
            self.mtime + Duration::from_nanos(1)
        };
    }

    /// Copy bytes from `offset` into `buf`. Reading at or past the end
    /// yields nothing.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, ErrorKind> {
        let Body::File(data) = &self.body else {
            return Err(ErrorKind::IsDirectory);
        };
        let len = data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    /// Write `src` at `offset`, zero-filling any gap past the old end.
    pub fn write_at(&mut self, src: &[u8], offset: u64, limit: Option<u64>) -> Result<usize, ErrorKind> {
        let Body::File(data) = &mut self.body else {
            return Err(ErrorKind::IsDirectory);
        };
        let end = offset
            .checked_add(src.len() as u64)
            .ok_or(ErrorKind::FileTooLarge)?;
        if limit.is_some_and(|max| end > max) {
            return Err(ErrorKind::FileTooLarge);
        }
        let start = usize::try_from(offset).map_err(|_| ErrorKind::FileTooLarge)?;
        let end = start.checked_add(src.len()).ok_or(ErrorKind::FileTooLarge)?;
        grow(data, end)?;
        data[start..end].copy_from_slice(src);
        Ok(src.len())
    }

    /// Append `src` at the current end; returns the new length.
    pub fn append(&mut self, src: &[u8], limit: Option<u64>) -> Result<u64, ErrorKind> {
        let end = self.size();
        self.write_at(src, end, limit)?;
        Ok(end + src.len() as u64)
    }

    /// Resize content, zero-filling growth and discarding on shrink.
    pub fn set_len(&mut self, size: u64, limit: Option<u64>) -> Result<(), ErrorKind> {
        let Body::File(data) = &mut self.body else {
            return Err(ErrorKind::IsDirectory);
        };
        if limit.is_some_and(|max| size > max) {
            return Err(ErrorKind::FileTooLarge);
        }
        let size = usize::try_from(size).map_err(|_| ErrorKind::FileTooLarge)?;
        if size < data.len() {
            data.truncate(size);
            return Ok(());
        }
        grow(data, size)
    }
}

/// Zero-extend `data` to `len` bytes, failing instead of aborting when the
/// allocation cannot be made.
fn grow(data: &mut Vec<u8>, len: usize) -> Result<(), ErrorKind> {
    if len <= data.len() {
        return Ok(());
    }
    data.try_reserve(len - data.len())
        .map_err(|_| ErrorKind::FileTooLarge)?;
    data.resize(len, 0);
    Ok(())
}
