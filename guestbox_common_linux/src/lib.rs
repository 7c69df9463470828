//! Common Linux-y items shared by the guestbox crates: error numbers,
//! canonical syscall tags, flag sets, and the guest-visible wire structures.

pub mod errno;
pub mod nr;
pub mod signal;
pub mod stat;
pub mod time;

pub use errno::Errno;
pub use nr::Sysno;

use num_enum::TryFromPrimitive;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Special directory-FD value meaning "resolve against the current working
/// file system".
pub const AT_FDCWD: i32 = -100;

bitflags::bitflags! {
    /// Guest-ABI open flags, as passed to `open`/`openat` and stored in the
    /// per-descriptor flag table.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0x1;
        const RDWR = 0x2;
        const CREAT = 0x40;
        const EXCL = 0x80;
        const TRUNC = 0x200;
        const APPEND = 0x400;
        const CLOEXEC = 0x80000;
        const SYNC = 0x101000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Guest-ABI `mmap` flags.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct MapFlags: u32 {
        const SHARED = 0x01;
        const PRIVATE = 0x02;
        const FIXED = 0x10;
        const ANONYMOUS = 0x20;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Guest-ABI `clone` flags (only the ones the kernel honours).
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct CloneFlags: u32 {
        const VM = 0x0000_0100;
        const VFORK = 0x0000_4000;
        const SETTLS = 0x0008_0000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Guest-ABI `getrandom` flags.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct RngFlags: u32 {
        const RANDOM = 0x0001;
        const NONBLOCK = 0x0002;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

/// `fcntl` commands in guest numbering.
#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum FcntlCmd {
    Dupfd = 0,
    Getfd = 1,
    Setfd = 2,
    Getfl = 3,
    Setfl = 4,
    Getlk = 5,
    Setlk = 6,
    Setlkw = 7,
    Setown = 8,
    Getown = 9,
    Setsig = 10,
    Getsig = 11,
    Getlk64 = 12,
    Setlk64 = 13,
    Setlkw64 = 14,
}

/// `futex` operations (after masking the private/clock bits).
#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum FutexOp {
    Wait = 0,
    Wake = 1,
    Fd = 2,
    Requeue = 3,
    CmpRequeue = 4,
    WakeOp = 5,
    LockPi = 6,
    UnlockPi = 7,
    TrylockPi = 8,
    WaitBitset = 9,
    WakeBitset = 10,
    WaitRequeuePi = 11,
    CmpRequeuePi = 12,
}

/// Flag bits carried on top of a [`FutexOp`].
pub const FUTEX_PRIVATE_FLAG: u32 = 128;
pub const FUTEX_CLOCK_REALTIME: u32 = 256;
/// Mask selecting the command out of the `op` argument.
pub const FUTEX_CMD_MASK: u32 = !(FUTEX_PRIVATE_FLAG | FUTEX_CLOCK_REALTIME);

/// `rt_sigprocmask` behaviours. This ABI numbers them from 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(i32)]
pub enum SigmaskHow {
    Block = 1,
    Unblock = 2,
    Setmask = 3,
}

/// File-type bits folded into `st_mode`.
pub const S_IFIFO: u32 = 0x1000;
pub const S_IFCHR: u32 = 0x2000;
pub const S_IFDIR: u32 = 0x4000;
pub const S_IFBLK: u32 = 0x6000;
pub const S_IFREG: u32 = 0x8000;
pub const S_IFLNK: u32 = 0xA000;
pub const S_IFSOCK: u32 = 0xC000;

/// Socket address families (the subset the kernel recognises).
pub const AF_UNSPEC: i32 = 0;
pub const AF_LOCAL: i32 = 1;
pub const AF_INET: i32 = 2;
pub const AF_INET6: i32 = 10;

/// Socket types.
pub const SOCK_STREAM: i32 = 1;
pub const SOCK_DGRAM: i32 = 2;
/// Everything above this in the `type` argument is a flag bit
/// (`SOCK_CLOEXEC`, `SOCK_NONBLOCK`), stripped before dispatch.
pub const SOCK_TYPE_MASK: i32 = 0x7ffff;

/// The lone `prctl` option the kernel accepts.
pub const PR_SET_VMA: i32 = 0x53564d41;

/// The lone rlimit resource with a real value.
pub const RLIMIT_STACK: i32 = 3;

/// An I/O vector as laid out by a 32-bit guest.
#[repr(C)]
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IoVec32 {
    pub base: u32,
    pub len: u32,
}

/// An I/O vector as laid out by a 64-bit guest.
#[repr(C)]
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IoVec64 {
    pub base: u64,
    pub len: u64,
}

/// The `sysinfo` structure, written back to the guest verbatim.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Sysinfo {
    pub uptime: i64,
    pub loads: [u64; 3],
    pub totalram: u64,
    pub freeram: u64,
    pub sharedram: u64,
    pub bufferram: u64,
    pub totalswap: u64,
    pub freeswap: u64,
    pub procs: u16,
    #[doc(hidden)]
    pub _pad: [u8; 22],
}

/// A 64-bit `rlimit`, written back by `getrlimit`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Rlimit64 {
    pub rlim_cur: u64,
    pub rlim_max: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_sizes() {
        assert_eq!(core::mem::size_of::<IoVec32>(), 8);
        assert_eq!(core::mem::size_of::<IoVec64>(), 16);
        assert_eq!(core::mem::size_of::<Sysinfo>(), 104);
        assert_eq!(core::mem::size_of::<Rlimit64>(), 16);
    }

    #[test]
    fn futex_mask_strips_flag_bits() {
        let op = FutexOp::Wait as u32 | FUTEX_PRIVATE_FLAG | FUTEX_CLOCK_REALTIME;
        assert_eq!(FutexOp::try_from(op & FUTEX_CMD_MASK), Ok(FutexOp::Wait));
    }
}
