//! Base-path confinement.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{Op, VfsResult, from_handle_io};
use crate::ops::{File, Fs};
use crate::path::{self, ROOT};
use crate::types::{FileAttr, FileMode, OpenFlags};

/// Exposes a directory of an inner filesystem as the root.
///
/// Caller paths are normalized before the base is prepended, so `..` can
/// never climb above the base. The base itself is only cleaned: a relative
/// base stays relative to whatever the inner filesystem resolves it against.
/// Errors and handle names always show the caller's path, never the real one.
#[derive(Debug, Clone)]
pub struct BasePathFs {
    inner: Arc<dyn Fs>,
    base: String,
}

impl BasePathFs {
    pub fn new(inner: Arc<dyn Fs>, base: impl AsRef<Path>) -> Self {
        Self {
            inner,
            base: path::clean(&base.as_ref().to_string_lossy()),
        }
    }

    /// The base directory inside the inner filesystem.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Translate a caller path to the inner filesystem.
    pub fn real_path(&self, path: &Path) -> PathBuf {
        let clean = path::normalize(path);
        PathBuf::from(path::rebase(&clean, ROOT, &self.base))
    }

    fn wrap(&self, file: Box<dyn File>, path: &Path) -> Box<dyn File> {
        Box::new(BasePathFile {
            inner: file,
            name: path.to_string_lossy().into_owned(),
        })
    }
}

impl Fs for BasePathFs {
    fn name(&self) -> &str {
        "BasePathFs"
    }

    fn create(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        let file = self
            .inner
            .create(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))?;
        Ok(self.wrap(file, path))
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn File>> {
        let file = self
            .inner
            .open(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))?;
        Ok(self.wrap(file, path))
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, mode: FileMode) -> VfsResult<Box<dyn File>> {
        let file = self
            .inner
            .open_file(&self.real_path(path), flags, mode)
            .map_err(|e| e.with_paths(path, None))?;
        Ok(self.wrap(file, path))
    }

    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.inner
            .mkdir(&self.real_path(path), mode)
            .map_err(|e| e.with_paths(path, None))
    }

    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.inner
            .mkdir_all(&self.real_path(path), mode)
            .map_err(|e| e.with_paths(path, None))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<FileAttr>> {
        self.inner
            .read_dir(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        self.inner
            .remove(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        self.inner
            .remove_all(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))
    }

    fn rename(&self, old: &Path, new: &Path) -> VfsResult<()> {
        self.inner
            .rename(&self.real_path(old), &self.real_path(new))
            .map_err(|e| e.with_paths(old, Some(new)))
    }

    fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        let mut attr = self
            .inner
            .stat(&self.real_path(path))
            .map_err(|e| e.with_paths(path, None))?;
        if path::normalize(path) == ROOT {
            attr.name = ROOT.to_string();
        }
        Ok(attr)
    }

    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        self.inner
            .chmod(&self.real_path(path), mode)
            .map_err(|e| e.with_paths(path, None))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.inner
            .chtimes(&self.real_path(path), atime, mtime)
            .map_err(|e| e.with_paths(path, None))
    }
}

/// Handle that reports the caller's path in its name and errors.
#[derive(Debug)]
struct BasePathFile {
    inner: Box<dyn File>,
    name: String,
}

impl BasePathFile {
    fn io_err(&self, op: Op, e: io::Error) -> io::Error {
        from_handle_io(op, &self.name, e)
            .with_paths(&self.name, None)
            .into()
    }
}

impl Read for BasePathFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        result.map_err(|e| self.io_err(Op::Read, e))
    }
}

impl Write for BasePathFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        result.map_err(|e| self.io_err(Op::Write, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        result.map_err(|e| self.io_err(Op::Write, e))
    }
}

impl Seek for BasePathFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = self.inner.seek(pos);
        result.map_err(|e| self.io_err(Op::Seek, e))
    }
}

impl File for BasePathFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        self.inner.stat().map_err(|e| e.with_paths(&self.name, None))
    }

    fn truncate(&mut self, size: u64) -> VfsResult<()> {
        let result = self.inner.truncate(size);
        result.map_err(|e| e.with_paths(&self.name, None))
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        let result = self.inner.read_at(buf, offset);
        result.map_err(|e| e.with_paths(&self.name, None))
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize> {
        let result = self.inner.write_at(buf, offset);
        result.map_err(|e| e.with_paths(&self.name, None))
    }

    fn close(&mut self) -> VfsResult<()> {
        let result = self.inner.close();
        result.map_err(|e| e.with_paths(&self.name, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, VfsError};
    use crate::mem::MemoryFs;

    fn setup() -> (Arc<MemoryFs>, BasePathFs) {
        let mem = Arc::new(MemoryFs::new());
        mem.mkdir_all(Path::new("/jail/home"), FileMode::new(0o755)).unwrap();
        let fs = BasePathFs::new(mem.clone(), "/jail");
        (mem, fs)
    }

    #[test]
    fn test_real_path() {
        let (_, fs) = setup();
        assert_eq!(fs.real_path(Path::new("/a/b")), PathBuf::from("/jail/a/b"));
        assert_eq!(fs.real_path(Path::new("/")), PathBuf::from("/jail"));
        assert_eq!(fs.real_path(Path::new("../../etc/passwd")), PathBuf::from("/jail/etc/passwd"));
        assert_eq!(fs.base(), "/jail");
    }

    #[test]
    fn test_relative_base_stays_relative() {
        let mem = Arc::new(MemoryFs::new());
        let fs = BasePathFs::new(mem, "./scratch/");
        assert_eq!(fs.base(), "scratch");
        assert_eq!(fs.real_path(Path::new("/a/../b")), PathBuf::from("scratch/b"));
        assert_eq!(fs.real_path(Path::new("/")), PathBuf::from("scratch"));
        assert_eq!(fs.real_path(Path::new("../../x")), PathBuf::from("scratch/x"));
    }

    #[test]
    fn test_writes_land_under_base() {
        let (mem, fs) = setup();
        fs.write_all(Path::new("/home/f"), b"data").unwrap();
        assert_eq!(mem.read_all(Path::new("/jail/home/f")).unwrap(), b"data");
        assert_eq!(fs.stat(Path::new("/")).unwrap().name, "/");
    }

    #[test]
    fn test_errors_show_caller_path() {
        let (_, fs) = setup();
        let err = fs.stat(Path::new("/nope")).unwrap_err();
        assert_eq!(err, VfsError::path(Op::Stat, "/nope", ErrorKind::NotExist));

        let err = fs.rename(Path::new("/x"), Path::new("/y")).unwrap_err();
        assert_eq!(err, VfsError::link(Op::Rename, "/x", "/y", ErrorKind::NotExist));
    }

    #[test]
    fn test_handle_name_is_caller_path() {
        let (_, fs) = setup();
        let mut f = fs.create(Path::new("/home/g")).unwrap();
        assert_eq!(f.name(), "/home/g");

        let mut ro = fs.open(Path::new("/home/g")).unwrap();
        let err = from_handle_io(Op::Write, "/", ro.write(b"x").unwrap_err());
        assert_eq!(err, VfsError::path(Op::Write, "/home/g", ErrorKind::BadDescriptor));
        f.close().unwrap();
    }
}
