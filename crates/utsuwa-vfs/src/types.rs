//! Core VFS types.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Op, VfsError, VfsResult};

/// File mode: permission bits plus a type bit in the high range.
///
/// Only the low nine bits (and setuid/setgid/sticky through chmod) are ever
/// stored for a new entry; type-like bits a caller passes are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileMode(u32);

impl FileMode {
    pub const DIR: FileMode = FileMode(1 << 31);
    pub const SYMLINK: FileMode = FileMode(1 << 27);
    pub const DEVICE: FileMode = FileMode(1 << 26);
    pub const NAMED_PIPE: FileMode = FileMode(1 << 25);
    pub const SOCKET: FileMode = FileMode(1 << 24);
    pub const SETUID: FileMode = FileMode(1 << 23);
    pub const SETGID: FileMode = FileMode(1 << 22);
    pub const CHAR_DEVICE: FileMode = FileMode(1 << 21);
    pub const STICKY: FileMode = FileMode(1 << 20);

    /// rwxrwxrwx
    pub const PERM: u32 = 0o777;

    /// Bits that identify the entry type.
    pub const TYPE: u32 = Self::DIR.0
        | Self::SYMLINK.0
        | Self::DEVICE.0
        | Self::NAMED_PIPE.0
        | Self::SOCKET.0
        | Self::CHAR_DEVICE.0;

    /// Bits chmod may change.
    pub const CHMOD: u32 = Self::PERM | Self::SETUID.0 | Self::SETGID.0 | Self::STICKY.0;

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Permission bits only.
    pub const fn perm(self) -> u32 {
        self.0 & Self::PERM
    }

    /// Type bits only.
    pub const fn type_bits(self) -> u32 {
        self.0 & Self::TYPE
    }

    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }

    pub const fn is_regular(self) -> bool {
        self.type_bits() == 0
    }

    /// Directory mode with the permission bits of `self`.
    pub const fn dir_with_perm(self) -> Self {
        Self(Self::DIR.0 | self.perm())
    }

    /// File mode with the permission bits of `self`.
    pub const fn file_with_perm(self) -> Self {
        Self(self.perm())
    }

    /// Apply a chmod request: the type bits of `self` survive untouched.
    pub const fn chmod(self, requested: FileMode) -> Self {
        Self(self.type_bits() | (requested.0 & Self::CHMOD))
    }

    /// Convert a Unix `st_mode`.
    pub fn from_unix(st_mode: u32) -> Self {
        const S_IFMT: u32 = 0o170000;
        let kind = match st_mode & S_IFMT {
            0o040000 => Self::DIR.0,
            0o120000 => Self::SYMLINK.0,
            0o010000 => Self::NAMED_PIPE.0,
            0o140000 => Self::SOCKET.0,
            0o060000 => Self::DEVICE.0,
            0o020000 => Self::DEVICE.0 | Self::CHAR_DEVICE.0,
            _ => 0,
        };
        let mut bits = kind | (st_mode & Self::PERM);
        if st_mode & 0o4000 != 0 {
            bits |= Self::SETUID.0;
        }
        if st_mode & 0o2000 != 0 {
            bits |= Self::SETGID.0;
        }
        if st_mode & 0o1000 != 0 {
            bits |= Self::STICKY.0;
        }
        Self(bits)
    }

    /// Permission and special bits as a Unix mode, for host calls.
    pub fn to_unix_perm(self) -> u32 {
        let mut mode = self.perm();
        if self.0 & Self::SETUID.0 != 0 {
            mode |= 0o4000;
        }
        if self.0 & Self::SETGID.0 != 0 {
            mode |= 0o2000;
        }
        if self.0 & Self::STICKY.0 != 0 {
            mode |= 0o1000;
        }
        mode
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl std::ops::BitOr for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOr<u32> for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: u32) -> Self {
        Self(self.0 | rhs)
    }
}

/// `ls -l` rendering, e.g. `drwx------`.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() {
            'd'
        } else if self.0 & Self::SYMLINK.0 != 0 {
            'l'
        } else if self.0 & Self::NAMED_PIPE.0 != 0 {
            'p'
        } else if self.0 & Self::SOCKET.0 != 0 {
            's'
        } else if self.0 & Self::CHAR_DEVICE.0 != 0 {
            'c'
        } else if self.0 & Self::DEVICE.0 != 0 {
            'b'
        } else {
            '-'
        };
        let mut out = String::with_capacity(10);
        out.push(kind);
        for shift in [6u32, 3, 0] {
            let triple = (self.0 >> shift) & 0o7;
            out.push(if triple & 0o4 != 0 { 'r' } else { '-' });
            out.push(if triple & 0o2 != 0 { 'w' } else { '-' });
            out.push(if triple & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&out)
    }
}

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Metadata snapshot of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Leaf name (not the full path); `/` for the root.
    pub name: String,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// Type and permission bits.
    pub mode: FileMode,
    /// Last modification time.
    pub mtime: SystemTime,
    /// File type.
    pub kind: FileType,
}

impl FileAttr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode. Implies write access.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Write-only access.
    pub fn write_only() -> Self {
        Self {
            read: false,
            write: true,
            ..Default::default()
        }
    }

    /// Append to the end, creating the file if needed.
    pub fn append() -> Self {
        Self {
            read: false,
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create with write access.
    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Whether the handle may modify content.
    pub fn writable(&self) -> bool {
        self.write || self.append
    }

    /// Whether opening with these flags can change the tree or a file.
    pub fn mutates(&self) -> bool {
        self.writable() || self.create || self.truncate
    }

    /// Reject combinations that have no meaning.
    pub fn validate(&self, path: &std::path::Path) -> VfsResult<()> {
        if self.exclusive && !self.create {
            return Err(VfsError::path(Op::Open, path, ErrorKind::InvalidArgument));
        }
        if !self.read && !self.writable() && !self.create && !self.truncate {
            return Err(VfsError::path(Op::Open, path, ErrorKind::InvalidArgument));
        }
        Ok(())
    }
}
