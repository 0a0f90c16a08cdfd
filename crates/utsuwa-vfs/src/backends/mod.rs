//! Backends and wrappers at the interface boundary.
//!
//! [`OsFs`] talks to the host filesystem. The rest wrap any other [`Fs`]
//! and delegate to it.
//!
//! [`Fs`]: crate::Fs

mod base_path;
mod os;
mod read_only;
mod regexp;

pub use base_path::BasePathFs;
pub use os::{OsFile, OsFs};
pub use read_only::ReadOnlyFs;
pub use regexp::RegexFs;
