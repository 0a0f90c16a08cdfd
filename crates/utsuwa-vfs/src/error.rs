//! VFS error types.
//!
//! Every failure a backend reports carries the operation that failed, the
//! path exactly as the caller passed it, and an [`ErrorKind`] drawn from a
//! vocabulary shared by all backends. Wrapper layers can therefore forward
//! errors without callers being able to tell which backend produced them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reason a filesystem operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// Target, or a required ancestor, is absent.
    #[error("file does not exist")]
    NotExist,

    /// An entry already occupies the path.
    #[error("file already exists")]
    Exist,

    /// A path segment expected to be a directory is a file.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation targeted a directory.
    #[error("is a directory")]
    IsDirectory,

    /// Non-recursive removal of a directory that still has children.
    #[error("directory not empty")]
    NotEmpty,

    /// Malformed flags, mode, or a negative seek result.
    #[error("invalid argument")]
    InvalidArgument,

    /// A minimum-length read ran out of data.
    #[error("unexpected EOF")]
    UnexpectedEof,

    /// The operation is not permitted on this path or backend.
    #[error("operation not permitted")]
    PermissionDenied,

    /// The handle was not opened with the access the operation needs.
    #[error("bad file descriptor")]
    BadDescriptor,

    /// The handle has already been closed.
    #[error("file already closed")]
    Closed,

    /// The configured size limit would be exceeded.
    #[error("file too large")]
    FileTooLarge,

    /// The configured handle limit would be exceeded.
    #[error("too many open files")]
    TooManyOpenFiles,

    /// Anything the vocabulary above does not cover (host I/O errors).
    #[error("I/O error")]
    Other,
}

impl ErrorKind {
    /// Map a host I/O error onto the shared vocabulary.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotExist,
            io::ErrorKind::AlreadyExists => ErrorKind::Exist,
            io::ErrorKind::NotADirectory => ErrorKind::NotDirectory,
            io::ErrorKind::IsADirectory => ErrorKind::IsDirectory,
            io::ErrorKind::DirectoryNotEmpty => ErrorKind::NotEmpty,
            io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            io::ErrorKind::UnexpectedEof => ErrorKind::UnexpectedEof,
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                ErrorKind::PermissionDenied
            }
            io::ErrorKind::FileTooLarge => ErrorKind::FileTooLarge,
            _ => ErrorKind::Other,
        }
    }

    /// The closest `std::io::ErrorKind`.
    pub fn to_io(self) -> io::ErrorKind {
        match self {
            ErrorKind::NotExist => io::ErrorKind::NotFound,
            ErrorKind::Exist => io::ErrorKind::AlreadyExists,
            ErrorKind::NotDirectory => io::ErrorKind::NotADirectory,
            ErrorKind::IsDirectory => io::ErrorKind::IsADirectory,
            ErrorKind::NotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorKind::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            ErrorKind::PermissionDenied | ErrorKind::BadDescriptor => {
                io::ErrorKind::PermissionDenied
            }
            ErrorKind::Closed => io::ErrorKind::BrokenPipe,
            ErrorKind::FileTooLarge => io::ErrorKind::FileTooLarge,
            ErrorKind::TooManyOpenFiles => io::ErrorKind::ResourceBusy,
            ErrorKind::Other => io::ErrorKind::Other,
        }
    }
}

/// Name of the operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Open,
    Mkdir,
    Remove,
    Rename,
    Stat,
    Chmod,
    Chtimes,
    ReadDir,
    Read,
    Write,
    Seek,
    Truncate,
    Close,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Open => "open",
            Op::Mkdir => "mkdir",
            Op::Remove => "remove",
            Op::Rename => "rename",
            Op::Stat => "stat",
            Op::Chmod => "chmod",
            Op::Chtimes => "chtimes",
            Op::ReadDir => "readdir",
            Op::Read => "read",
            Op::Write => "write",
            Op::Seek => "seek",
            Op::Truncate => "truncate",
            Op::Close => "close",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VFS error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// Failure of an operation on a single path.
    #[error("{op} {}: {kind}", path.display())]
    Path {
        op: Op,
        path: PathBuf,
        kind: ErrorKind,
    },

    /// Failure of an operation involving two paths (rename).
    #[error("{op} {} {}: {kind}", old.display(), new.display())]
    Link {
        op: Op,
        old: PathBuf,
        new: PathBuf,
        kind: ErrorKind,
    },
}

impl VfsError {
    /// Create a single-path error.
    pub fn path(op: Op, path: impl AsRef<Path>, kind: ErrorKind) -> Self {
        Self::Path {
            op,
            path: path.as_ref().to_path_buf(),
            kind,
        }
    }

    /// Create a two-path error.
    pub fn link(op: Op, old: impl AsRef<Path>, new: impl AsRef<Path>, kind: ErrorKind) -> Self {
        Self::Link {
            op,
            old: old.as_ref().to_path_buf(),
            new: new.as_ref().to_path_buf(),
            kind,
        }
    }

    /// Wrap a host I/O error for `path`.
    pub fn from_io(op: Op, path: impl AsRef<Path>, err: &io::Error) -> Self {
        Self::path(op, path, ErrorKind::from_io(err))
    }

    /// The reason code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::Path { kind, .. } | VfsError::Link { kind, .. } => *kind,
        }
    }

    /// The failing operation.
    pub fn op(&self) -> Op {
        match self {
            VfsError::Path { op, .. } | VfsError::Link { op, .. } => *op,
        }
    }

    /// The path of a single-path error, or the source path of a rename.
    pub fn path_ref(&self) -> &Path {
        match self {
            VfsError::Path { path, .. } => path,
            VfsError::Link { old, .. } => old,
        }
    }

    /// Replace the reported paths, keeping op and kind.
    ///
    /// Wrappers that translate paths use this so the caller sees the path it
    /// passed rather than the translated one.
    pub fn with_paths(self, path: impl AsRef<Path>, new: Option<&Path>) -> Self {
        match (self, new) {
            (VfsError::Link { op, kind, .. }, Some(new)) => Self::link(op, path, new, kind),
            (err, _) => Self::path(err.op(), path, err.kind()),
        }
    }

    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotExist
    }

    pub fn is_exist(&self) -> bool {
        self.kind() == ErrorKind::Exist
    }

    pub fn is_not_dir(&self) -> bool {
        self.kind() == ErrorKind::NotDirectory
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == ErrorKind::IsDirectory
    }

    pub fn is_not_empty(&self) -> bool {
        self.kind() == ErrorKind::NotEmpty
    }
}

/// Convert VfsError to std::io::Error for compatibility.
///
/// The structured error rides along as the inner payload, so
/// `io_err.get_ref().and_then(|e| e.downcast_ref::<VfsError>())` recovers it.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        io::Error::new(e.kind().to_io(), e)
    }
}

/// Recover a [`VfsError`] from an I/O error produced by a [`File`](crate::File)
/// handle, or describe a foreign one against `op`/`path`.
pub fn from_handle_io(op: Op, path: impl AsRef<Path>, err: io::Error) -> VfsError {
    match err.get_ref().and_then(|inner| inner.downcast_ref::<VfsError>()) {
        Some(inner) => inner.clone(),
        None => VfsError::from_io(op, path, &err),
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = VfsError::path(Op::Mkdir, "/a/b/c", ErrorKind::NotExist);
        assert_eq!(err.to_string(), "mkdir /a/b/c: file does not exist");

        let err = VfsError::link(Op::Rename, "/old", "/new", ErrorKind::NotExist);
        assert_eq!(err.to_string(), "rename /old /new: file does not exist");
    }

    #[test]
    fn test_io_round_trip_keeps_structure() {
        let err = VfsError::path(Op::Open, "/foo", ErrorKind::IsDirectory);
        let io_err: io::Error = err.clone().into();
        assert_eq!(io_err.kind(), io::ErrorKind::IsADirectory);

        let back = from_handle_io(Op::Read, "/elsewhere", io_err);
        assert_eq!(back, err);
    }

    #[test]
    fn test_foreign_io_error_gets_kind() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = from_handle_io(Op::Stat, "/x", io_err);
        assert_eq!(err, VfsError::path(Op::Stat, "/x", ErrorKind::NotExist));
    }

    #[test]
    fn test_with_paths_replaces_not_wraps() {
        let err = VfsError::path(Op::Stat, "/base/real/x", ErrorKind::NotExist);
        let err = err.with_paths("/x", None);
        assert_eq!(err, VfsError::path(Op::Stat, "/x", ErrorKind::NotExist));

        let err = VfsError::link(Op::Rename, "/base/a", "/base/b", ErrorKind::NotExist);
        let err = err.with_paths("/a", Some(Path::new("/b")));
        assert_eq!(err, VfsError::link(Op::Rename, "/a", "/b", ErrorKind::NotExist));
    }

    #[test]
    fn test_path_ref() {
        let err = VfsError::path(Op::Chmod, "/a", ErrorKind::NotExist);
        assert_eq!(err.path_ref(), Path::new("/a"));
        let err = VfsError::link(Op::Rename, "/old", "/new", ErrorKind::Exist);
        assert_eq!(err.path_ref(), Path::new("/old"));
    }

    #[test]
    fn test_predicates() {
        assert!(VfsError::path(Op::Remove, "/a", ErrorKind::NotEmpty).is_not_empty());
        assert!(VfsError::path(Op::Mkdir, "/a", ErrorKind::Exist).is_exist());
        assert!(!VfsError::path(Op::Mkdir, "/a", ErrorKind::Exist).is_not_exist());
    }
}
