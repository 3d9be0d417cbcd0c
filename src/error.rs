//! Error type shared by every layer of the filesystem engine.
//!
//! Core routines never return raw errno integers; they return a
//! [`GnordoError`]. The FUSE front end is the only place that converts a
//! `GnordoError` into a POSIX errno via [`GnordoError::to_errno`].

use std::fmt;

/// An error raised by the filesystem engine.
#[derive(Debug)]
pub enum GnordoError {
    /// No such file or directory. (ENOENT)
    NotFound,
    /// Permission denied. (EACCES)
    PermissionDenied,
    /// No space left on the image. (ENOSPC)
    OutOfSpace,
    /// The inode table is exhausted. (ENOMEM, per the original source)
    OutOfInodes,
    /// Directory not empty. (ENOTEMPTY)
    NotEmpty,
    /// Not a directory. (ENOTDIR)
    NotADirectory,
    /// Is a directory. (EISDIR)
    IsADirectory,
    /// An entry with this name already exists. (EEXIST)
    AlreadyExists,
    /// A name component is too long to fit in a directory entry. (ENAMETOOLONG)
    NameTooLong,
    /// A generic invalid argument. (EINVAL)
    InvalidArgument,
    /// The image is missing the superblock magic, or a structure read back
    /// failed an invariant check.
    Corrupt(&'static str),
    /// A short read or write against the underlying image file.
    Io(std::io::Error),
}

impl fmt::Display for GnordoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GnordoError::NotFound => write!(f, "no such file or directory"),
            GnordoError::PermissionDenied => write!(f, "permission denied"),
            GnordoError::OutOfSpace => write!(f, "no space left on device"),
            GnordoError::OutOfInodes => write!(f, "out of inodes"),
            GnordoError::NotEmpty => write!(f, "directory not empty"),
            GnordoError::NotADirectory => write!(f, "not a directory"),
            GnordoError::IsADirectory => write!(f, "is a directory"),
            GnordoError::AlreadyExists => write!(f, "entry already exists"),
            GnordoError::NameTooLong => write!(f, "name too long"),
            GnordoError::InvalidArgument => write!(f, "invalid argument"),
            GnordoError::Corrupt(why) => write!(f, "image is corrupted: {why}"),
            GnordoError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for GnordoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GnordoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GnordoError {
    fn from(e: std::io::Error) -> Self {
        GnordoError::Io(e)
    }
}

impl GnordoError {
    /// Maps this error onto the POSIX errno the FUSE boundary should report.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            GnordoError::NotFound => libc::ENOENT,
            GnordoError::PermissionDenied => libc::EACCES,
            GnordoError::OutOfSpace => libc::ENOSPC,
            GnordoError::OutOfInodes => libc::ENOMEM,
            GnordoError::NotEmpty => libc::ENOTEMPTY,
            GnordoError::NotADirectory => libc::ENOTDIR,
            GnordoError::IsADirectory => libc::EISDIR,
            GnordoError::AlreadyExists => libc::EEXIST,
            GnordoError::NameTooLong => libc::ENAMETOOLONG,
            GnordoError::InvalidArgument => libc::EINVAL,
            GnordoError::Corrupt(_) => libc::EIO,
            GnordoError::Io(_) => libc::EIO,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, GnordoError>;
