//! Open-file handles of the in-memory engine.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::node::Node;
use crate::error::{ErrorKind, Op, VfsError, VfsResult};
use crate::ops::{File, closed};
use crate::types::{FileAttr, OpenFlags};

/// Live-handle counter shared by an engine and all its handles.
#[derive(Debug)]
pub(crate) struct HandleCount {
    open: AtomicUsize,
    max: Option<usize>,
}

impl HandleCount {
    pub fn new(max: Option<usize>) -> Self {
        Self {
            open: AtomicUsize::new(0),
            max,
        }
    }

    /// Claim a slot for a handle about to be opened.
    pub fn acquire(&self) -> Result<(), ErrorKind> {
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| match self.max {
                Some(max) if open >= max => None,
                _ => Some(open + 1),
            })
            .map(|_| ())
            .map_err(|_| ErrorKind::TooManyOpenFiles)
    }

    pub fn release(&self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }
}

/// A handle on a file or directory node.
///
/// The handle holds the node itself, not its path, so it keeps working after
/// the entry is removed or renamed. I/O locks only this node.
#[derive(Debug)]
pub struct MemFile {
    node: Arc<Node>,
    name: String,
    offset: u64,
    flags: OpenFlags,
    closed: bool,
    /// Content was written or truncated through this handle.
    dirty: bool,
    max_file_size: Option<u64>,
    handles: Arc<HandleCount>,
}

impl MemFile {
    /// Wrap `node` in a handle. The caller has already claimed a slot in
    /// `handles`; closing the handle gives it back.
    pub(crate) fn new(
        node: Arc<Node>,
        name: String,
        flags: OpenFlags,
        max_file_size: Option<u64>,
        handles: Arc<HandleCount>,
    ) -> Self {
        if flags.writable() {
            node.lock().writers += 1;
        }
        tracing::trace!(path = %name, ?flags, "open");
        Self {
            node,
            name,
            offset: 0,
            flags,
            closed: false,
            dirty: false,
            max_file_size,
            handles,
        }
    }

    /// Current cursor position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn err(&self, op: Op, kind: ErrorKind) -> VfsError {
        VfsError::path(op, &self.name, kind)
    }

    fn check_open(&self, op: Op) -> VfsResult<()> {
        if self.closed {
            return Err(closed(op, &self.name));
        }
        Ok(())
    }

    fn check_readable(&self, op: Op) -> VfsResult<()> {
        self.check_open(op)?;
        if !self.flags.read {
            return Err(self.err(op, ErrorKind::BadDescriptor));
        }
        Ok(())
    }

    fn check_writable(&self, op: Op) -> VfsResult<()> {
        self.check_open(op)?;
        if !self.flags.writable() {
            return Err(self.err(op, ErrorKind::BadDescriptor));
        }
        Ok(())
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_readable(Op::Read)?;
        let n = self
            .node
            .lock()
            .read_at(buf, self.offset)
            .map_err(|kind| self.err(Op::Read, kind))?;
        self.offset += n as u64;
        Ok(n)
    }

    fn write_inner(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.check_writable(Op::Write)?;
        let mut state = self.node.lock();
        if self.flags.append {
            let end = state
                .append(buf, self.max_file_size)
                .map_err(|kind| self.err(Op::Write, kind))?;
            self.offset = end;
        } else {
            let n = state
                .write_at(buf, self.offset, self.max_file_size)
                .map_err(|kind| self.err(Op::Write, kind))?;
            self.offset += n as u64;
        }
        self.dirty = true;
        Ok(buf.len())
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.check_open(Op::Seek)?;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.node.lock().size()) + i128::from(delta),
        };
        self.offset =
            u64::try_from(target).map_err(|_| self.err(Op::Seek, ErrorKind::InvalidArgument))?;
        Ok(self.offset)
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_inner(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_inner(pos)?)
    }
}

impl File for MemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        self.check_open(Op::Stat)?;
        Ok(self.node.attr())
    }

    fn truncate(&mut self, size: u64) -> VfsResult<()> {
        self.check_writable(Op::Truncate)?;
        self.node
            .lock()
            .set_len(size, self.max_file_size)
            .map_err(|kind| self.err(Op::Truncate, kind))?;
        self.dirty = true;
        Ok(())
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        self.check_readable(Op::Read)?;
        self.node
            .lock()
            .read_at(buf, offset)
            .map_err(|kind| self.err(Op::Read, kind))
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize> {
        self.check_writable(Op::Write)?;
        if self.flags.append {
            return Err(self.err(Op::Write, ErrorKind::InvalidArgument));
        }
        let n = self
            .node
            .lock()
            .write_at(buf, offset, self.max_file_size)
            .map_err(|kind| self.err(Op::Write, kind))?;
        self.dirty = true;
        Ok(n)
    }

    fn close(&mut self) -> VfsResult<()> {
        self.check_open(Op::Close)?;
        self.closed = true;
        self.handles.release();
        if self.flags.writable() {
            let mut state = self.node.lock();
            state.writers = state.writers.saturating_sub(1);
            if self.dirty || state.writers == 0 {
                state.touch();
            }
        }
        tracing::trace!(path = %self.name, "close");
        Ok(())
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                tracing::warn!(path = %self.name, error = %e, "close on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileMode;

    fn open(node: &Arc<Node>, flags: OpenFlags, handles: &Arc<HandleCount>) -> MemFile {
        handles.acquire().unwrap();
        MemFile::new(Arc::clone(node), "/f".to_string(), flags, None, Arc::clone(handles))
    }

    fn handle(node: &Arc<Node>, flags: OpenFlags) -> MemFile {
        open(node, flags, &Arc::new(HandleCount::new(None)))
    }

    fn file_node() -> Arc<Node> {
        Arc::new(Node::file("f", FileMode::new(0o644)))
    }

    #[test]
    fn test_overwrite_in_place() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::write());
        f.write_all(b"hello").unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        f.write_all(b"HI").unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();

        let mut out = String::new();
        f.read_to_string(&mut out).unwrap();
        assert_eq!(out, "HIllo");
    }

    #[test]
    fn test_cursors_are_independent() {
        let node = file_node();
        let mut writer = handle(&node, OpenFlags::write());
        writer.write_all(b"abcdef").unwrap();

        let mut a = handle(&node, OpenFlags::read());
        let mut b = handle(&node, OpenFlags::read());
        let mut buf = [0u8; 2];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ab");
        b.seek(SeekFrom::End(-2)).unwrap();
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ef");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
    }

    #[test]
    fn test_append_ignores_seek() {
        let node = file_node();
        handle(&node, OpenFlags::write()).write_all(b"1234").unwrap();

        let mut f = handle(&node, OpenFlags::append());
        f.seek(SeekFrom::Start(0)).unwrap();
        f.write_all(b"56").unwrap();
        assert_eq!(f.offset(), 6);
        assert_eq!(node.attr().size, 6);

        let err = f.write_at(b"x", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_negative_seek() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::read());
        let err = f.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(f.offset(), 0);
    }

    #[test]
    fn test_read_only_handle_rejects_writes() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::read());
        let err = crate::error::from_handle_io(Op::Write, "/f", f.write(b"x").unwrap_err());
        assert_eq!(err.kind(), ErrorKind::BadDescriptor);
        assert_eq!(f.truncate(1).unwrap_err().kind(), ErrorKind::BadDescriptor);
    }

    #[test]
    fn test_write_only_handle_rejects_reads() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::write_only());
        f.write_all(b"abc").unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(f.read_at(&mut buf, 0).unwrap_err().kind(), ErrorKind::BadDescriptor);
        let err = crate::error::from_handle_io(Op::Read, "/f", f.read(&mut buf).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::BadDescriptor);
    }

    #[test]
    fn test_truncate_keeps_cursor() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::write());
        f.write_all(b"abcdef").unwrap();
        f.truncate(2).unwrap();
        assert_eq!(f.offset(), 6);
        assert_eq!(f.stat().unwrap().size, 2);

        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
        f.truncate(4).unwrap();
        assert_eq!(f.read_at(&mut buf, 0).unwrap(), 4);
        assert_eq!(&buf, b"ab\0\0");
    }

    #[test]
    fn test_closed_handle() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::write());
        f.close().unwrap();
        assert_eq!(f.close().unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(f.stat().unwrap_err().kind(), ErrorKind::Closed);
        assert!(f.write(b"x").is_err());
    }

    #[test]
    fn test_close_stamps_mtime() {
        let node = file_node();
        let before = node.attr().mtime;
        let mut f = handle(&node, OpenFlags::write());
        f.write_all(b"x").unwrap();
        f.close().unwrap();
        assert!(node.attr().mtime > before);
        assert_eq!(node.lock().writers, 0);
    }

    #[test]
    fn test_close_order_with_two_writers() {
        // Clean writer closes last, so it stamps as the last writer.
        let node = file_node();
        let mut a = handle(&node, OpenFlags::write());
        let mut b = handle(&node, OpenFlags::write());
        assert_eq!(node.lock().writers, 2);
        a.write_all(b"a").unwrap();

        let t0 = node.attr().mtime;
        a.close().unwrap();
        let t1 = node.attr().mtime;
        assert!(t1 > t0);
        assert_eq!(node.lock().writers, 1);
        b.close().unwrap();
        assert!(node.attr().mtime > t1);
        assert_eq!(node.lock().writers, 0);

        // Clean writer closes first while another is still open: no stamp.
        let node = file_node();
        let mut a = handle(&node, OpenFlags::write());
        let mut b = handle(&node, OpenFlags::write());
        a.write_all(b"a").unwrap();

        let t0 = node.attr().mtime;
        b.close().unwrap();
        assert_eq!(node.attr().mtime, t0);
        assert_eq!(node.lock().writers, 1);
        a.close().unwrap();
        assert!(node.attr().mtime > t0);
        assert_eq!(node.lock().writers, 0);
    }

    #[test]
    fn test_two_dirty_writers_each_stamp() {
        let node = file_node();
        let mut a = handle(&node, OpenFlags::write());
        let mut b = handle(&node, OpenFlags::write());
        a.write_all(b"a").unwrap();
        b.write_at(b"b", 1).unwrap();

        let t0 = node.attr().mtime;
        b.close().unwrap();
        let t1 = node.attr().mtime;
        a.close().unwrap();
        let t2 = node.attr().mtime;
        assert!(t0 < t1 && t1 < t2);
        assert_eq!(node.lock().writers, 0);
    }

    #[test]
    fn test_huge_offset_fails_cleanly() {
        let node = file_node();
        let mut f = handle(&node, OpenFlags::write());
        f.write_all(b"abc").unwrap();

        assert_eq!(f.seek(SeekFrom::Start(1 << 63)).unwrap(), 1 << 63);
        let err = crate::error::from_handle_io(Op::Write, "/f", f.write(b"x").unwrap_err());
        assert_eq!(err.kind(), ErrorKind::FileTooLarge);
        assert_eq!(f.truncate(1 << 63).unwrap_err().kind(), ErrorKind::FileTooLarge);
        assert_eq!(f.write_at(b"x", u64::MAX).unwrap_err().kind(), ErrorKind::FileTooLarge);
        assert_eq!(f.stat().unwrap().size, 3);
    }

    #[test]
    fn test_handle_limit() {
        let node = file_node();
        let handles = Arc::new(HandleCount::new(Some(1)));
        let first = open(&node, OpenFlags::read(), &handles);
        assert_eq!(handles.acquire(), Err(ErrorKind::TooManyOpenFiles));

        drop(first);
        assert_eq!(handles.open(), 0);
        assert!(handles.acquire().is_ok());
    }

    #[test]
    fn test_directory_handle() {
        let node = Arc::new(Node::dir("d", FileMode::new(0o755)));
        let mut f = handle(&node, OpenFlags::read());
        let mut buf = [0u8; 1];
        let err = f.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
        assert!(f.stat().unwrap().is_dir());
    }
}
