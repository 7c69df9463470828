//! Guest addresses and typed guest-memory I/O.
//!
//! A [`GuestPtr`] is a plain 64-bit address in the guest's address space; the
//! null pointer is the literal value 0. All reads and writes go through the
//! host's [`GuestMem`] implementation, with typed helpers layered on top via
//! `zerocopy` bounds so that wire structs move in and out of guest memory
//! without manual byte shuffling.

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// An address in the guest's virtual address space.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GuestPtr(u64);

impl GuestPtr {
    /// The null guest pointer.
    pub const NULL: Self = Self(0);

    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset the address by `n` bytes (wrapping, like guest pointer math).
    #[must_use]
    pub const fn add(self, n: u64) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

impl From<u64> for GuestPtr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

impl core::fmt::Display for GuestPtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Errors surfaced by guest-memory accesses.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("unmapped guest memory at {0}")]
    Unmapped(GuestPtr),
    #[error("protection violation at {0}")]
    Protected(GuestPtr),
}

bitflags::bitflags! {
    /// Protection of a guest virtual region.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct MemProt: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
        const ALL = Self::READ.bits() | Self::WRITE.bits() | Self::EXEC.bits();
    }
}

/// A mapped guest virtual region, as reported back by the host.
#[derive(Copy, Clone, Debug)]
pub struct MemRegion {
    pub addr: GuestPtr,
    pub len: u64,
    pub prot: MemProt,
}

/// Errors surfaced by the mapping operations.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("invalid mapping request")]
    Invalid,
    #[error("guest address space exhausted")]
    Exhausted,
}

/// Byte-level access to the guest address space.
///
/// Only the two raw methods must be provided; the typed helpers are derived.
pub trait GuestMem {
    /// Read `buf.len()` bytes starting at `addr`.
    fn mem_read(&self, addr: GuestPtr, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write all of `data` starting at `addr`.
    fn mem_write(&self, addr: GuestPtr, data: &[u8]) -> Result<(), MemoryError>;

    /// Read one `T` at `addr`.
    fn read_obj<T: FromBytes + IntoBytes>(&self, addr: GuestPtr) -> Result<T, MemoryError>
    where
        Self: Sized,
    {
        let mut value = T::new_zeroed();
        self.mem_read(addr, value.as_mut_bytes())?;
        Ok(value)
    }

    /// Write one `T` at `addr`.
    fn write_obj<T: IntoBytes + Immutable>(
        &self,
        addr: GuestPtr,
        value: &T,
    ) -> Result<(), MemoryError>
    where
        Self: Sized,
    {
        self.mem_write(addr, value.as_bytes())
    }

    /// Read a NUL-terminated string starting at `addr`.
    ///
    /// Reads one byte at a time so a string ending just before an unmapped
    /// page does not fault. Non-UTF-8 bytes are replaced.
    fn read_cstring(&self, addr: GuestPtr) -> Result<String, MemoryError>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        let mut cursor = addr;
        loop {
            let mut byte = [0u8; 1];
            self.mem_read(cursor, &mut byte)?;
            if byte[0] == 0 {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(byte[0]);
            cursor = cursor.add(1);
        }
    }
}
