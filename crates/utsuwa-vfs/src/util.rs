//! Helpers that work over any backend.

use std::io::{ErrorKind as IoErrorKind, Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Op, VfsError, VfsResult, from_handle_io};
use crate::ops::{File, Fs};
use crate::types::FileAttr;

/// Read from `file` until at least `min` bytes are in `buf`.
///
/// Returns the number of bytes read, which may exceed `min`. If nothing could
/// be read and the cursor sits exactly at end-of-file the result is `Ok(0)`.
/// Running dry anywhere else (part way through, or with the cursor already
/// beyond the end) is `UnexpectedEof`.
pub fn read_at_least<F>(file: &mut F, buf: &mut [u8], min: usize) -> VfsResult<usize>
where
    F: File + ?Sized,
{
    if min > buf.len() {
        return Err(VfsError::path(Op::Read, file.name(), ErrorKind::InvalidArgument));
    }
    let mut filled = 0;
    while filled < min {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(from_handle_io(Op::Read, file.name(), e)),
        }
    }
    if filled >= min {
        return Ok(filled);
    }
    if filled == 0 {
        let cursor = file
            .stream_position()
            .map_err(|e| from_handle_io(Op::Seek, file.name(), e))?;
        if cursor == file.stat()?.size {
            return Ok(0);
        }
    }
    Err(VfsError::path(Op::Read, file.name(), ErrorKind::UnexpectedEof))
}

/// Whether `path` names a directory.
pub fn is_dir<F: Fs + ?Sized>(fs: &F, path: &Path) -> VfsResult<bool> {
    Ok(fs.stat(path)?.is_dir())
}

/// Visit `root` and everything beneath it, depth first, children in name
/// order. Returning an error from `visit` stops the walk.
pub fn walk<F, V>(fs: &F, root: &Path, mut visit: V) -> VfsResult<()>
where
    F: Fs + ?Sized,
    V: FnMut(&Path, &FileAttr) -> VfsResult<()>,
{
    let attr = fs.stat(root)?;
    let mut stack: Vec<(PathBuf, FileAttr)> = vec![(root.to_path_buf(), attr)];
    while let Some((path, attr)) = stack.pop() {
        visit(&path, &attr)?;
        if attr.is_dir() {
            let children = fs.read_dir(&path)?;
            for child in children.into_iter().rev() {
                stack.push((path.join(&child.name), child));
            }
        }
    }
    Ok(())
}
