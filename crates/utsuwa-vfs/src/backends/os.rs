//! Host filesystem backend.
//!
//! Forwards every operation to `std::fs` unchanged. Paths are host paths;
//! combine with [`BasePathFs`](super::BasePathFs) to confine them to a
//! directory.

use std::fs::{self, DirBuilder, FileTimes, OpenOptions, Permissions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{ErrorKind, Op, VfsError, VfsResult};
use crate::ops::{DEFAULT_FILE_MODE, File, Fs, closed};
use crate::types::{FileAttr, FileMode, FileType, OpenFlags};

/// Host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::fs::Metadata to FileAttr.
    fn metadata_to_attr(name: String, meta: &fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };
        FileAttr {
            name,
            size: if meta.is_dir() { 0 } else { meta.len() },
            mode: FileMode::from_unix(meta.mode()),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            kind,
        }
    }
}

/// Leaf name of a host path; `/` for the root.
fn leaf(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string())
}

impl Fs for OsFs {
    fn name(&self) -> &str {
        "OsFs"
    }

    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.open_file(path, OpenFlags::create_truncate(), DEFAULT_FILE_MODE)
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        self.open_file(path, OpenFlags::read(), FileMode::default())
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode) -> VfsResult<Box<dyn File>> {
        flags.validate(path)?;
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.exclusive)
            .truncate(flags.truncate)
            .mode(mode.to_unix_perm())
            .open(path)
            .map_err(|e| VfsError::from_io(Op::Open, path, &e))?;
        tracing::trace!(path = %path.display(), ?flags, "open");
        Ok(Box::new(OsFile {
            file: Some(file),
            name: path.to_string_lossy().into_owned(),
        }))
    }

    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        DirBuilder::new()
            .mode(mode.to_unix_perm())
            .create(path)
            .map_err(|e| VfsError::from_io(Op::Mkdir, path, &e))
    }

    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(mode.to_unix_perm())
            .create(path)
            .map_err(|e| VfsError::from_io(Op::Mkdir, path, &e))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>> {
        let io_err = |e: io::Error| VfsError::from_io(Op::ReadDir, path, &e);
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let meta = entry.metadata().map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::metadata_to_attr(name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        let io_err = |e: io::Error| VfsError::from_io(Op::Remove, path, &e);
        let meta = fs::symlink_metadata(path).map_err(io_err)?;
        if meta.is_dir() {
            fs::remove_dir(path).map_err(io_err)
        } else {
            fs::remove_file(path).map_err(io_err)
        }
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        let io_err = |e: io::Error| VfsError::from_io(Op::Remove, path, &e);
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if matches!(ErrorKind::from_io(&e), ErrorKind::NotExist | ErrorKind::NotDirectory) => {
                return Ok(());
            }
            Err(e) => return Err(io_err(e)),
        };
        if meta.is_dir() {
            fs::remove_dir_all(path).map_err(io_err)
        } else {
            fs::remove_file(path).map_err(io_err)
        }
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        fs::rename(old, new)
            .map_err(|e| VfsError::link(Op::Rename, old, new, ErrorKind::from_io(&e)))
    }

    fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        let meta = fs::metadata(path).map_err(|e| VfsError::from_io(Op::Stat, path, &e))?;
        Ok(Self::metadata_to_attr(leaf(path), &meta))
    }

    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        fs::set_permissions(path, Permissions::from_mode(mode.to_unix_perm()))
            .map_err(|e| VfsError::from_io(Op::Chmod, path, &e))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        let io_err = |e: io::Error| VfsError::from_io(Op::Chtimes, path, &e);
        let file = fs::File::open(path).map_err(io_err)?;
        file.set_times(FileTimes::new().set_accessed(atime).set_modified(mtime))
            .map_err(io_err)
    }
}

/// Handle on a host file.
#[derive(Debug)]
pub struct OsFile {
    /// `None` once closed.
    file: Option<fs::File>,
    name: String,
}

impl OsFile {
    fn inner(&mut self, op: Op) -> VfsResult<&mut fs::File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(closed(op, &self.name)),
        }
    }

    fn io_err(&self, op: Op, e: &io::Error) -> io::Error {
        VfsError::from_io(op, &self.name, e).into()
    }
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner(Op::Read)?.read(buf);
        result.map_err(|e| self.io_err(Op::Read, &e))
    }
}

impl Write for OsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner(Op::Write)?.write(buf);
        result.map_err(|e| self.io_err(Op::Write, &e))
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner(Op::Write)?.flush();
        result.map_err(|e| self.io_err(Op::Write, &e))
    }
}

impl Seek for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = self.inner(Op::Seek)?.seek(pos);
        result.map_err(|e| self.io_err(Op::Seek, &e))
    }
}

impl File for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| closed(Op::Stat, &self.name))?;
        let meta = file
            .metadata()
            .map_err(|e| VfsError::from_io(Op::Stat, &self.name, &e))?;
        Ok(OsFs::metadata_to_attr(leaf(Path::new(&self.name)), &meta))
    }

    fn truncate(&mut self, size: u64) -> VfsResult<()> {
        let result = self.inner(Op::Truncate)?.set_len(size);
        result.map_err(|e| VfsError::from_io(Op::Truncate, &self.name, &e))
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        let result = self.inner(Op::Read)?.read_at(buf, offset);
        result.map_err(|e| VfsError::from_io(Op::Read, &self.name, &e))
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize> {
        let result = self.inner(Op::Write)?.write_at(buf, offset);
        result.map_err(|e| VfsError::from_io(Op::Write, &self.name, &e))
    }

    fn close(&mut self) -> VfsResult<()> {
        match self.file.take() {
            Some(_) => {
                tracing::trace!(path = %self.name, "close");
                Ok(())
            }
            None => Err(closed(Op::Close, &self.name)),
        }
    }
}
