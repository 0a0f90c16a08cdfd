//! Virtual filesystem with POSIX-like semantics.
//!
//! - [`Fs`] - the operation set every backend implements
//! - [`File`] - an open handle with its own cursor
//! - [`MemoryFs`] - in-memory engine, safe to share between threads
//! - [`OsFs`] - the host filesystem
//! - [`BasePathFs`], [`ReadOnlyFs`], [`RegexFs`] - wrappers over another `Fs`
//!
//! All backends report failures as [`VfsError`]s carrying the failing
//! operation, the caller's path and an [`ErrorKind`], so callers cannot tell
//! backends apart by their errors.

pub mod backends;
pub mod config;
mod error;
pub mod mem;
mod ops;
pub mod path;
mod types;
pub mod util;

pub use backends::{BasePathFs, OsFile, OsFs, ReadOnlyFs, RegexFs};
pub use config::{ConfigError, MemFsConfig};
pub use error::{ErrorKind, Op, VfsError, VfsResult, from_handle_io};
pub use mem::{MemFile, MemoryFs};
pub use ops::{DEFAULT_FILE_MODE, File, Fs};
pub use types::{FileAttr, FileMode, FileType, OpenFlags};
