//! Guest signal structures, in both ABI widths, plus the blocked-signal set.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A set of signals. Bits are 1-indexed: bit `i - 1` corresponds to signal
/// number `i`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SigSet(u64);

impl SigSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn add(&mut self, sig: i32) {
        self.0 |= 1 << (sig - 1);
    }

    pub fn remove(&mut self, sig: i32) {
        self.0 &= !(1 << (sig - 1));
    }

    pub const fn contains(self, sig: i32) -> bool {
        self.0 & (1 << (sig - 1)) != 0
    }

    /// Block everything in `other`.
    pub fn block(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Unblock everything in `other`.
    pub fn unblock(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// The kernel's own record of a signal action, independent of guest ABI.
#[derive(Copy, Clone, Debug)]
pub struct SigActionRecord {
    pub handler: u64,
    pub flags: i32,
    pub restorer: u64,
    pub mask: u64,
}

/// `sigaction` as laid out by a 64-bit guest.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SigAction64 {
    pub handler: u64,
    pub flags: i32,
    #[doc(hidden)]
    pub __pad: u32,
    pub restorer: u64,
    pub mask: u64,
}

impl From<SigAction64> for SigActionRecord {
    fn from(act: SigAction64) -> Self {
        Self {
            handler: act.handler,
            flags: act.flags,
            restorer: act.restorer,
            mask: act.mask,
        }
    }
}

impl From<SigActionRecord> for SigAction64 {
    fn from(rec: SigActionRecord) -> Self {
        Self {
            handler: rec.handler,
            flags: rec.flags,
            __pad: 0,
            restorer: rec.restorer,
            mask: rec.mask,
        }
    }
}

/// `sigaction` as laid out by a 32-bit guest.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SigAction32 {
    pub handler: u32,
    pub flags: i32,
    pub mask: u32,
    pub restorer: u32,
}

impl From<SigAction32> for SigActionRecord {
    fn from(act: SigAction32) -> Self {
        Self {
            handler: act.handler.into(),
            flags: act.flags,
            restorer: act.restorer.into(),
            mask: act.mask.into(),
        }
    }
}

impl From<SigActionRecord> for SigAction32 {
    fn from(rec: SigActionRecord) -> Self {
        Self {
            handler: rec.handler as u32,
            flags: rec.flags,
            mask: rec.mask as u32,
            restorer: rec.restorer as u32,
        }
    }
}

/// The fixed-size `siginfo` block validated by `rt_tgsigqueueinfo`.
#[repr(C)]
#[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Siginfo {
    pub signo: i32,
    pub errno: i32,
    pub code: i32,
    #[doc(hidden)]
    pub _pad: [i32; 29],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigset_bits_are_one_indexed() {
        let mut set = SigSet::empty();
        set.add(1);
        assert_eq!(set.bits(), 0b1);
        set.add(17);
        assert!(set.contains(17));
        set.remove(1);
        assert!(!set.contains(1));
        assert_eq!(set.bits(), 1 << 16);
    }

    #[test]
    fn wire_sizes() {
        assert_eq!(core::mem::size_of::<SigAction64>(), 32);
        assert_eq!(core::mem::size_of::<SigAction32>(), 16);
        assert_eq!(core::mem::size_of::<Siginfo>(), 128);
    }
}
