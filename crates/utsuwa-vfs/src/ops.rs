//! VFS operations traits.
//!
//! [`Fs`] is the capability interface every backend implements: the
//! in-memory engine, the host filesystem, and the wrappers that decorate
//! another `Fs`. [`File`] is the open handle they hand out.
//!
//! Paths are interpreted as absolute. Errors always name the path exactly
//! as the caller passed it.

use std::fmt::Debug;
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{ErrorKind, Op, VfsError, VfsResult, from_handle_io};
use crate::types::{FileAttr, FileMode, OpenFlags};

/// Mode given to files made by [`Fs::create`] and [`Fs::write_all`].
pub const DEFAULT_FILE_MODE: FileMode = FileMode::new(0o666);

/// Core VFS operations trait.
pub trait Fs: Send + Sync + Debug {
    /// Name of this backend, for diagnostics.
    fn name(&self) -> &str;

    // ========================================================================
    // Files
    // ========================================================================

    /// Create or truncate a file with mode 0o666, opened read-write.
    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>>;

    /// Open a file read-only.
    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>>;

    /// Open with explicit flags.
    ///
    /// `mode` only matters when a file is created, and only its permission
    /// bits are stored.
    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode)
    -> VfsResult<Box<dyn File>>;

    // ========================================================================
    // Directories
    // ========================================================================

    /// Create a single directory. The parent must exist.
    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Create a directory and every missing ancestor.
    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Metadata of a directory's immediate children, sorted by name.
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>>;

    // ========================================================================
    // Tree mutation
    // ========================================================================

    /// Remove a file or an empty directory.
    fn remove(&self, path: &Path) -> VfsResult<()>;

    /// Remove a path and everything beneath it. Absent paths are not an error.
    fn remove_all(&self, path: &Path) -> VfsResult<()>;

    /// Move a file or directory subtree.
    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn stat(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Replace permission bits. The type bit never changes.
    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Set the modification time. Access time is accepted for interface
    /// compatibility; backends may ignore it.
    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> VfsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    /// Read entire file contents.
    fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let mut file = self.open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| from_handle_io(Op::Read, path, e))?;
        file.close()?;
        Ok(data)
    }

    /// Write entire file contents, creating or truncating the file.
    fn write_all(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        let mut file = self.open_file(
            path,
            OpenFlags {
                read: false,
                ..OpenFlags::create_truncate()
            },
            DEFAULT_FILE_MODE,
        )?;
        file.write_all(data)
            .map_err(|e| from_handle_io(Op::Write, path, e))?;
        file.close()
    }
}

/// An open file handle.
///
/// Each handle has its own cursor. `Read`, `Write` and `Seek` report errors as
/// `std::io::Error`s carrying a [`VfsError`] payload.
pub trait File: Read + Write + Seek + Send + Debug {
    /// The path this handle was opened with.
    fn name(&self) -> &str;

    /// Metadata of the underlying entry.
    fn stat(&self) -> VfsResult<FileAttr>;

    /// Set the content length, zero-filling growth. The cursor stays put.
    fn truncate(&mut self, size: u64) -> VfsResult<()>;

    /// Read at `offset` without moving the cursor.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize>;

    /// Write at `offset` without moving the cursor.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize>;

    /// Release the handle. Every later call fails with `Closed`.
    fn close(&mut self) -> VfsResult<()>;
}

/// Error for a call on a handle that has already been closed.
pub(crate) fn closed(op: Op, name: &str) -> VfsError {
    VfsError::path(op, name, ErrorKind::Closed)
}
