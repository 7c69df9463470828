//! The AAPCS64 `va_list`: arguments come out of the general/vector register
//! save areas until those run dry, then off the stack.
//!
//! `gr_offs`/`vr_offs` are negative while their save area still holds
//! arguments and count up towards zero; a non-negative offset means the area
//! is exhausted. An argument can straddle the boundary, in which case it is
//! stitched together from the tail of the save area and the head of the
//! stack.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use guestbox::mem::{GuestMem, GuestPtr, MemoryError};

/// The guest wire layout (32 bytes including trailing padding).
#[repr(C)]
#[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawVaList {
    stack: u64,
    gr_top: u64,
    vr_top: u64,
    gr_offs: i32,
    vr_offs: i32,
}

pub(super) struct Aapcs64List {
    stack: u64,
    gr_top: u64,
    vr_top: u64,
    gr_offs: i32,
    vr_offs: i32,
}

impl Aapcs64List {
    pub(super) fn new<E: GuestMem>(emu: &E, ptr: GuestPtr) -> Result<Self, MemoryError> {
        let raw: RawVaList = emu.read_obj(ptr)?;
        Ok(Self {
            stack: raw.stack,
            gr_top: raw.gr_top,
            vr_top: raw.vr_top,
            gr_offs: raw.gr_offs,
            vr_offs: raw.vr_offs,
        })
    }

    fn gr_cursor(&self) -> GuestPtr {
        GuestPtr::new(self.gr_top.wrapping_add_signed(self.gr_offs.into()))
    }

    pub(super) fn read<E: GuestMem>(&mut self, emu: &E, buf: &mut [u8]) -> Result<(), MemoryError> {
        let n = buf.len();
        if self.gr_offs >= 0 {
            emu.mem_read(GuestPtr::new(self.stack), buf)?;
            self.stack += n as u64;
        } else if n as i64 + i64::from(self.gr_offs) <= 0 {
            emu.mem_read(self.gr_cursor(), buf)?;
            self.gr_offs += n as i32;
        } else {
            // Straddling read: drain the register save area, then continue
            // on the stack.
            let head = (-self.gr_offs) as usize;
            emu.mem_read(self.gr_cursor(), &mut buf[..head])?;
            self.gr_offs = 0;
            let rest = n - head;
            emu.mem_read(GuestPtr::new(self.stack), &mut buf[head..])?;
            self.stack += rest as u64;
        }
        Ok(())
    }

    pub(super) fn read_f64<E: GuestMem>(&mut self, emu: &E) -> Result<f64, MemoryError> {
        let mut word = [0u8; 8];
        if self.vr_offs >= 0 {
            emu.mem_read(GuestPtr::new(self.stack), &mut word)?;
            self.stack += 8;
        } else {
            let addr = GuestPtr::new(self.vr_top.wrapping_add_signed(self.vr_offs.into()));
            emu.mem_read(addr, &mut word)?;
            // Vector slots are 16 bytes wide regardless of the value read.
            self.vr_offs += 16;
        }
        Ok(f64::from_le_bytes(word))
    }

    pub(super) fn skip(&mut self, n: u64) {
        if self.gr_offs < 0 {
            self.gr_offs += n as i32;
        } else {
            self.stack += n;
        }
    }

    pub(super) fn align(&mut self) {
        self.stack = (self.stack + 7) & !7;
        self.gr_offs = (self.gr_offs + 7) & !7;
    }
}
