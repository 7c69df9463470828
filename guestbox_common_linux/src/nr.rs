//! Canonical syscall numbering.
//!
//! [`Sysno`] abstracts over the Linux `__NR_*` families: its discriminants
//! follow the asm-generic table used by AArch64, while the legacy 32-bit
//! tables (ARM EABI, i386) and the x86-64 table are folded onto the canonical
//! tags by [`Sysno::from_raw`]. Syscalls with no asm-generic number (`open`,
//! `mmap2`) carry synthetic tags above the real number space.

use guestbox::Arch;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A canonical syscall tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Sysno {
    Dup3 = 24,
    Fcntl = 25,
    Ioctl = 29,
    Faccessat = 48,
    Openat = 56,
    Close = 57,
    Pipe2 = 59,
    Lseek = 62,
    Read = 63,
    Write = 64,
    Writev = 66,
    Readlinkat = 78,
    /// `fstatat64` on 32-bit ABIs, `newfstatat` on 64-bit ones.
    Fstatat = 79,
    /// `fstat64` on 32-bit ABIs, `fstat` on 64-bit ones.
    Fstat = 80,
    Exit = 93,
    ExitGroup = 94,
    Futex = 98,
    ClockGettime = 113,
    Sigaltstack = 132,
    RtSigaction = 134,
    RtSigprocmask = 135,
    Getrlimit = 163,
    Setrlimit = 164,
    Prctl = 167,
    Gettimeofday = 169,
    Getpid = 172,
    Getuid = 174,
    Geteuid = 175,
    Gettid = 178,
    Sysinfo = 179,
    Socket = 198,
    Munmap = 215,
    Clone = 220,
    Execve = 221,
    Mmap = 222,
    Mprotect = 226,
    Madvise = 233,
    RtTgsigqueueinfo = 240,
    Getrandom = 278,

    // Not present in the asm-generic table; synthetic tags.
    Open = 0x1000,
    Mmap2 = 0x1001,
}

impl Sysno {
    /// Map an architecture-specific raw syscall number onto its canonical
    /// tag. Unknown numbers yield `None`, which the dispatcher treats as
    /// "not ours".
    pub fn from_raw(arch: Arch, nr: u64) -> Option<Self> {
        match arch {
            Arch::Arm64 => {
                let nr = u16::try_from(nr).ok()?;
                // Reject the synthetic range; only real asm-generic numbers
                // arrive from a guest.
                if nr >= 0x1000 {
                    return None;
                }
                Self::try_from(nr).ok()
            }
            Arch::Arm => from_arm_eabi(nr),
            Arch::X86 => from_i386(nr),
            Arch::X86_64 => from_x86_64(nr),
        }
    }
}

/// The ARM EABI table.
fn from_arm_eabi(nr: u64) -> Option<Sysno> {
    Some(match nr {
        1 => Sysno::Exit,
        3 => Sysno::Read,
        4 => Sysno::Write,
        5 => Sysno::Open,
        6 => Sysno::Close,
        11 => Sysno::Execve,
        19 => Sysno::Lseek,
        20 => Sysno::Getpid,
        54 => Sysno::Ioctl,
        55 => Sysno::Fcntl,
        75 => Sysno::Setrlimit,
        78 => Sysno::Gettimeofday,
        91 => Sysno::Munmap,
        116 => Sysno::Sysinfo,
        120 => Sysno::Clone,
        125 => Sysno::Mprotect,
        146 => Sysno::Writev,
        172 => Sysno::Prctl,
        174 => Sysno::RtSigaction,
        175 => Sysno::RtSigprocmask,
        186 => Sysno::Sigaltstack,
        191 => Sysno::Getrlimit, // ugetrlimit
        192 => Sysno::Mmap2,
        197 => Sysno::Fstat, // fstat64
        199 => Sysno::Getuid,
        201 => Sysno::Geteuid,
        220 => Sysno::Madvise,
        224 => Sysno::Gettid,
        240 => Sysno::Futex,
        248 => Sysno::ExitGroup,
        263 => Sysno::ClockGettime,
        281 => Sysno::Socket,
        322 => Sysno::Openat,
        327 => Sysno::Fstatat, // fstatat64
        332 => Sysno::Readlinkat,
        334 => Sysno::Faccessat,
        358 => Sysno::Dup3,
        359 => Sysno::Pipe2,
        363 => Sysno::RtTgsigqueueinfo,
        384 => Sysno::Getrandom,
        _ => return None,
    })
}

/// The i386 table.
fn from_i386(nr: u64) -> Option<Sysno> {
    Some(match nr {
        1 => Sysno::Exit,
        3 => Sysno::Read,
        4 => Sysno::Write,
        5 => Sysno::Open,
        6 => Sysno::Close,
        11 => Sysno::Execve,
        19 => Sysno::Lseek,
        20 => Sysno::Getpid,
        54 => Sysno::Ioctl,
        55 => Sysno::Fcntl,
        75 => Sysno::Setrlimit,
        78 => Sysno::Gettimeofday,
        91 => Sysno::Munmap,
        116 => Sysno::Sysinfo,
        120 => Sysno::Clone,
        125 => Sysno::Mprotect,
        146 => Sysno::Writev,
        172 => Sysno::Prctl,
        174 => Sysno::RtSigaction,
        175 => Sysno::RtSigprocmask,
        186 => Sysno::Sigaltstack,
        191 => Sysno::Getrlimit, // ugetrlimit
        192 => Sysno::Mmap2,
        197 => Sysno::Fstat, // fstat64
        199 => Sysno::Getuid,
        201 => Sysno::Geteuid,
        219 => Sysno::Madvise,
        224 => Sysno::Gettid,
        240 => Sysno::Futex,
        252 => Sysno::ExitGroup,
        265 => Sysno::ClockGettime,
        295 => Sysno::Openat,
        300 => Sysno::Fstatat, // fstatat64
        305 => Sysno::Readlinkat,
        307 => Sysno::Faccessat,
        330 => Sysno::Dup3,
        331 => Sysno::Pipe2,
        335 => Sysno::RtTgsigqueueinfo,
        355 => Sysno::Getrandom,
        359 => Sysno::Socket,
        _ => return None,
    })
}

/// The x86-64 table.
fn from_x86_64(nr: u64) -> Option<Sysno> {
    Some(match nr {
        0 => Sysno::Read,
        1 => Sysno::Write,
        2 => Sysno::Open,
        3 => Sysno::Close,
        5 => Sysno::Fstat,
        8 => Sysno::Lseek,
        9 => Sysno::Mmap,
        10 => Sysno::Mprotect,
        11 => Sysno::Munmap,
        13 => Sysno::RtSigaction,
        14 => Sysno::RtSigprocmask,
        16 => Sysno::Ioctl,
        20 => Sysno::Writev,
        28 => Sysno::Madvise,
        39 => Sysno::Getpid,
        41 => Sysno::Socket,
        56 => Sysno::Clone,
        59 => Sysno::Execve,
        60 => Sysno::Exit,
        72 => Sysno::Fcntl,
        96 => Sysno::Gettimeofday,
        97 => Sysno::Getrlimit,
        99 => Sysno::Sysinfo,
        102 => Sysno::Getuid,
        107 => Sysno::Geteuid,
        131 => Sysno::Sigaltstack,
        157 => Sysno::Prctl,
        160 => Sysno::Setrlimit,
        186 => Sysno::Gettid,
        202 => Sysno::Futex,
        228 => Sysno::ClockGettime,
        231 => Sysno::ExitGroup,
        257 => Sysno::Openat,
        262 => Sysno::Fstatat, // newfstatat
        267 => Sysno::Readlinkat,
        269 => Sysno::Faccessat,
        292 => Sysno::Dup3,
        293 => Sysno::Pipe2,
        297 => Sysno::RtTgsigqueueinfo,
        318 => Sysno::Getrandom,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_numbers_round_trip() {
        assert_eq!(Sysno::from_raw(Arch::Arm64, 98), Some(Sysno::Futex));
        assert_eq!(Sysno::from_raw(Arch::Arm64, 222), Some(Sysno::Mmap));
        assert_eq!(Sysno::from_raw(Arch::Arm64, 0x1000), None);
        assert_eq!(Sysno::from_raw(Arch::Arm64, u64::MAX), None);
    }

    #[test]
    fn legacy_tables_agree_on_tags() {
        assert_eq!(Sysno::from_raw(Arch::Arm, 5), Some(Sysno::Open));
        assert_eq!(Sysno::from_raw(Arch::Arm, 192), Some(Sysno::Mmap2));
        assert_eq!(Sysno::from_raw(Arch::X86, 197), Some(Sysno::Fstat));
        assert_eq!(Sysno::from_raw(Arch::X86_64, 9), Some(Sysno::Mmap));
        assert_eq!(Sysno::from_raw(Arch::X86_64, 262), Some(Sysno::Fstatat));
        assert_eq!(Sysno::from_raw(Arch::Arm, 999), None);
    }
}
