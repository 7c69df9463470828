//! The two guest `stat` wire layouts.
//!
//! Both layouts are produced bit-exactly: the 64-bit family follows the
//! natural C layout (checked by the size test below), while the 32-bit
//! `stat64` family is packed with its historical explicit padding, leaving
//! `st_size` at the odd offset 44.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::time::Timespec64;

/// `struct stat` of the 64-bit ABIs.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Stat64 {
    pub st_dev: u64,
    pub st_ino: u64,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    #[doc(hidden)]
    pub __pad1: u64,
    pub st_size: i64,
    pub st_blksize: i32,
    #[doc(hidden)]
    pub __pad2: i32,
    pub st_blocks: i64,
    pub st_atim: Timespec64,
    pub st_mtim: Timespec64,
    pub st_ctim: Timespec64,
    #[doc(hidden)]
    pub __unused4: u32,
    #[doc(hidden)]
    pub __unused5: u32,
}

/// `struct stat64` of the 32-bit ABIs.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Stat3264 {
    pub st_dev: u64,
    #[doc(hidden)]
    pub __pad0: u32,
    pub __st_ino: u32,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    #[doc(hidden)]
    pub __pad3: u32,
    pub st_size: i64,
    pub st_blksize: u32,
    pub st_blocks: u64,
    pub st_atime: u32,
    pub st_atime_nsec: u32,
    pub st_mtime: u32,
    pub st_mtime_nsec: u32,
    pub st_ctime: u32,
    pub st_ctime_nsec: u32,
    pub st_ino: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};

    #[test]
    fn stat64_layout() {
        assert_eq!(size_of::<Stat64>(), 128);
        assert_eq!(offset_of!(Stat64, st_rdev), 32);
        assert_eq!(offset_of!(Stat64, st_size), 48);
        assert_eq!(offset_of!(Stat64, st_atim), 72);
        assert_eq!(offset_of!(Stat64, __unused4), 120);
    }

    #[test]
    fn stat3264_layout() {
        assert_eq!(size_of::<Stat3264>(), 96);
        assert_eq!(offset_of!(Stat3264, st_rdev), 32);
        assert_eq!(offset_of!(Stat3264, st_size), 44);
        assert_eq!(offset_of!(Stat3264, st_atime), 64);
        assert_eq!(offset_of!(Stat3264, st_ino), 88);
    }
}
