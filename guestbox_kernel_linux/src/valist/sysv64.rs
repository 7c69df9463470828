//! The x86-64 System V `va_list`: integer arguments come out of the first
//! six general-purpose slots of the register save area, doubles out of the
//! eight 16-byte XMM slots behind them, and everything else out of the
//! overflow area.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use guestbox::mem::{GuestMem, GuestPtr, MemoryError};

const GENERAL_OFFSET_MAX: u32 = 6 * 8;
const XMM_OFFSET_MAX: u32 = GENERAL_OFFSET_MAX + 8 * 16;

/// The guest wire layout (24 bytes).
#[repr(C)]
#[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawVaList {
    gp_offset: u32,
    fp_offset: u32,
    overflow_arg_area: u64,
    reg_save_area: u64,
}

pub(super) struct SysV64List {
    gp_offset: u32,
    fp_offset: u32,
    overflow: u64,
    reg_save: u64,
}

impl SysV64List {
    pub(super) fn new<E: GuestMem>(emu: &E, ptr: GuestPtr) -> Result<Self, MemoryError> {
        let raw: RawVaList = emu.read_obj(ptr)?;
        Ok(Self {
            gp_offset: raw.gp_offset,
            fp_offset: raw.fp_offset,
            overflow: raw.overflow_arg_area,
            reg_save: raw.reg_save_area,
        })
    }

    pub(super) fn read<E: GuestMem>(&mut self, emu: &E, buf: &mut [u8]) -> Result<(), MemoryError> {
        let n = buf.len() as u32;
        if self.gp_offset >= GENERAL_OFFSET_MAX {
            emu.mem_read(GuestPtr::new(self.overflow), buf)?;
            self.overflow += u64::from(n);
        } else if n + self.gp_offset <= GENERAL_OFFSET_MAX {
            let addr = GuestPtr::new(self.reg_save + u64::from(self.gp_offset));
            emu.mem_read(addr, buf)?;
            self.gp_offset += n;
        } else {
            // Straddling read: clear out the general-purpose area first.
            let head = (GENERAL_OFFSET_MAX - self.gp_offset) as usize;
            let addr = GuestPtr::new(self.reg_save + u64::from(self.gp_offset));
            emu.mem_read(addr, &mut buf[..head])?;
            self.gp_offset = GENERAL_OFFSET_MAX;
            let rest = buf.len() - head;
            emu.mem_read(GuestPtr::new(self.overflow), &mut buf[head..])?;
            self.overflow += rest as u64;
        }
        Ok(())
    }

    pub(super) fn read_f64<E: GuestMem>(&mut self, emu: &E) -> Result<f64, MemoryError> {
        let mut word = [0u8; 8];
        if self.fp_offset >= XMM_OFFSET_MAX {
            emu.mem_read(GuestPtr::new(self.overflow), &mut word)?;
            self.overflow += 8;
        } else {
            let addr = GuestPtr::new(self.reg_save + u64::from(self.fp_offset));
            emu.mem_read(addr, &mut word)?;
            // XMM slots are 16 bytes wide.
            self.fp_offset += 16;
        }
        Ok(f64::from_le_bytes(word))
    }

    pub(super) fn skip(&mut self, n: u64) {
        if self.gp_offset < GENERAL_OFFSET_MAX {
            self.gp_offset += n as u32;
        } else {
            self.overflow += n;
        }
    }

    pub(super) fn align(&mut self) {
        self.gp_offset = (self.gp_offset + 7) & !7;
        self.overflow = (self.overflow + 7) & !7;
    }
}
