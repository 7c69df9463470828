//! The file-system surface the host lends to the kernel.
//!
//! Files are capability-tested rather than downcast: a [`GuestFile`] exposes
//! each optional behaviour (reading, writing, seeking, device control, acting
//! as a directory) through an explicit `as_*` query returning `None` when the
//! capability is absent. Handlers branch on the query result and translate a
//! missing capability into the appropriate errno.

use std::io::SeekFrom;
use std::sync::Arc;

use thiserror::Error;

bitflags::bitflags! {
    /// Open flags understood by a host file system.
    ///
    /// The default (empty) set is read-only; access mode is widened by
    /// `WRONLY` or `RDWR`.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct FileFlags: u32 {
        const WRONLY = 1 << 0;
        const RDWR = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        const EXCL = 1 << 4;
        const SYNC = 1 << 5;
        const TRUNC = 1 << 6;
    }
}

/// The type of a file, as reported by [`FileStat`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileType {
    Regular,
    Directory,
    CharDevice,
    BlockDevice,
    NamedPipe,
    Symlink,
    Socket,
}

/// A modification timestamp with nanosecond precision.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FileTime {
    pub sec: i64,
    pub nsec: i64,
}

/// Metadata of a file, the host-side source for the guest `stat` families.
#[derive(Copy, Clone, Debug)]
pub struct FileStat {
    /// Permission bits only (the low 12 bits of a Unix mode).
    pub perm: u32,
    pub file_type: FileType,
    pub size: i64,
    pub mtime: FileTime,
}

/// Errors surfaced by host file systems and files.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not a directory")]
    NotADirectory,
    #[error("invalid argument")]
    Invalid,
    #[error("operation not supported by this file")]
    NotSupported,
    #[error("i/o failure")]
    Io,
}

/// Sequential read capability.
pub trait FileRead {
    /// Read up to `buf.len()` bytes; 0 means end of file.
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError>;
}

/// Sequential write capability.
pub trait FileWrite {
    fn write(&self, buf: &[u8]) -> Result<usize, FsError>;
}

/// Seek capability.
pub trait FileSeek {
    /// Reposition the file cursor, returning the new absolute offset.
    fn seek(&self, pos: SeekFrom) -> Result<u64, FsError>;
}

/// Device-control capability, backing `ioctl`.
pub trait FileControl {
    fn control(&self, cmd: u32, arg: u64) -> Result<(), FsError>;
}

/// An open file owned by the host's descriptor table.
///
/// Files are shared (`Arc`) between the host table and in-flight handlers, so
/// every method takes `&self`; implementations use interior mutability for
/// cursors and buffers.
pub trait GuestFile: Send + Sync {
    /// Metadata for this file.
    fn stat(&self) -> Result<FileStat, FsError>;

    /// Release host resources. Called once, after the file has left the
    /// descriptor table.
    fn close(&self) -> Result<(), FsError> {
        Ok(())
    }

    fn as_reader(&self) -> Option<&dyn FileRead> {
        None
    }

    fn as_writer(&self) -> Option<&dyn FileWrite> {
        None
    }

    fn as_seeker(&self) -> Option<&dyn FileSeek> {
        None
    }

    fn as_control(&self) -> Option<&dyn FileControl> {
        None
    }

    /// Directory capability: the file can be used as the base of `*at` path
    /// resolution.
    fn as_dir(&self) -> Option<&dyn FileSystem> {
        None
    }
}

/// A tree of files reachable by path.
pub trait FileSystem: Send + Sync {
    /// Open (and possibly create) `path`.
    fn open(
        &self,
        path: &str,
        flags: FileFlags,
        mode: u32,
    ) -> Result<Arc<dyn GuestFile>, FsError>;

    /// Stat `path` without opening it.
    fn stat(&self, path: &str) -> Result<FileStat, FsError>;

    /// Symlink-resolution capability, backing `readlinkat`.
    fn as_readlink(&self) -> Option<&dyn ReadlinkFs> {
        None
    }
}

/// Symlink resolution on a file system that supports it.
pub trait ReadlinkFs {
    /// Return the target of the symlink at `path`.
    fn read_link(&self, path: &str) -> Result<String, FsError>;
}
