//! Memory-mapping syscalls: `mmap`, `mmap2`, `mprotect`, `munmap`.
//!
//! Mappings are always materialised; there is no demand paging. File-backed
//! mappings advance the file to `offset` (seeking when possible, otherwise
//! reading and discarding) and then copy `len` bytes into the fresh region;
//! a file that runs out early fails the mapping.

use std::io::SeekFrom;
use std::sync::Arc;

use guestbox::fs::GuestFile;
use guestbox::mem::{GuestPtr, MemProt};
use guestbox::Emulator;
use guestbox_common_linux::{Errno, MapFlags};

use super::SyscallContext;

pub(crate) const PAGE_SIZE: u64 = 4096;

pub(crate) fn sys_munmap<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    addr: GuestPtr,
    len: u64,
) -> Result<i64, Errno> {
    ctx.emu.map_free(addr, len).map_err(|_| Errno::EINVAL)?;
    Ok(0)
}

pub(crate) fn sys_mmap<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    addr: GuestPtr,
    len: u64,
    prot: u32,
    flags: u32,
    fd: i32,
    offset: u64,
) -> Result<u64, Errno> {
    let flags = MapFlags::from_bits_retain(flags);
    let mut source: Option<Arc<dyn GuestFile>> = None;
    if !flags.contains(MapFlags::ANONYMOUS) && fd >= 0 {
        let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
        if file.as_reader().is_none() {
            return Err(Errno::ENODEV);
        }
        if offset != 0 {
            advance_to(&file, offset)?;
        }
        source = Some(file);
    }
    let prot = MemProt::from_bits_truncate(prot);
    let region = if flags.contains(MapFlags::FIXED) {
        // Whatever was mapped there before is gone; the new mapping replaces
        // it exactly at `addr`.
        let _ = ctx.emu.mem_unmap(addr, len);
        ctx.emu.mem_map(addr, len, prot).map_err(|_| Errno::EINVAL)?
    } else {
        ctx.emu.map_alloc(len, prot).map_err(|_| Errno::EINVAL)?
    };
    let base = region.addr;
    if let Some(file) = source {
        if let Err(err) = copy_into(ctx, &file, base, len) {
            let _ = ctx.emu.map_free(base, len);
            return Err(err);
        }
    }
    Ok(base.addr())
}

/// `mmap2` counts the offset in pages.
pub(crate) fn sys_mmap2<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    addr: GuestPtr,
    len: u64,
    prot: u32,
    flags: u32,
    fd: i32,
    pgoffset: u64,
) -> Result<u64, Errno> {
    sys_mmap(ctx, addr, len, prot, flags, fd, pgoffset * PAGE_SIZE)
}

pub(crate) fn sys_mprotect<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    addr: GuestPtr,
    len: u64,
    prot: u32,
) -> Result<i64, Errno> {
    ctx.emu
        .mem_protect(addr, len, MemProt::from_bits_truncate(prot))
        .map_err(|_| Errno::EINVAL)?;
    Ok(0)
}

/// Position `file` at `offset`: seek when the capability exists, otherwise
/// read and discard.
fn advance_to(file: &Arc<dyn GuestFile>, offset: u64) -> Result<(), Errno> {
    if let Some(seeker) = file.as_seeker() {
        seeker
            .seek(SeekFrom::Start(offset))
            .map_err(|_| Errno::ENODEV)?;
        return Ok(());
    }
    let reader = file.as_reader().ok_or(Errno::ENODEV)?;
    let mut remaining = offset;
    let mut sink = [0u8; 4096];
    while remaining > 0 {
        let take = sink.len().min(remaining as usize);
        let n = reader.read(&mut sink[..take]).map_err(|_| Errno::ENODEV)?;
        if n == 0 {
            // The file ended before the requested offset.
            return Err(Errno::ENODEV);
        }
        remaining -= n as u64;
    }
    Ok(())
}

/// Copy exactly `len` bytes of `file` into the region at `base`. A file that
/// ends before `len` fails the whole mapping.
fn copy_into<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    file: &Arc<dyn GuestFile>,
    base: GuestPtr,
    len: u64,
) -> Result<(), Errno> {
    let reader = file.as_reader().ok_or(Errno::ENODEV)?;
    let mut chunk = [0u8; 4096];
    let mut copied = 0u64;
    while copied < len {
        let take = chunk.len().min((len - copied) as usize);
        let n = reader.read(&mut chunk[..take]).map_err(|_| Errno::ENODEV)?;
        if n == 0 {
            return Err(Errno::ENODEV);
        }
        ctx.emu
            .mem_write(base.add(copied), &chunk[..n])
            .map_err(|_| Errno::ENODEV)?;
        copied += n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use guestbox::arch::Arch;
    use guestbox::mem::{GuestMem, GuestPtr};
    use guestbox_common_linux::{Errno, MapFlags, OpenFlags};

    use super::super::file;
    use super::super::tests::Fixture;
    use super::{sys_mmap, sys_mmap2, sys_mprotect, sys_munmap, PAGE_SIZE};

    const PROT_RW: u32 = 0x3;

    #[test]
    fn anonymous_mappings_are_fresh_and_zeroed() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let flags = (MapFlags::PRIVATE | MapFlags::ANONYMOUS).bits();
        let a = sys_mmap(&ctx, GuestPtr::NULL, 0x2000, PROT_RW, flags, -1, 0).unwrap();
        let b = sys_mmap(&ctx, GuestPtr::NULL, 0x2000, PROT_RW, flags, -1, 0).unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
        let word: [u8; 16] = fx.emu.read_obj(GuestPtr::new(a)).unwrap();
        assert_eq!(word, [0u8; 16]);
    }

    #[test]
    fn fixed_mappings_land_exactly_at_the_request() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let flags = (MapFlags::PRIVATE | MapFlags::ANONYMOUS | MapFlags::FIXED).bits();
        let addr = GuestPtr::new(0x7000_0000);
        let got = sys_mmap(&ctx, addr, 0x1000, PROT_RW, flags, -1, 0).unwrap();
        assert_eq!(got, 0x7000_0000);
        let word: [u8; 8] = fx.emu.read_obj(addr).unwrap();
        assert_eq!(word, [0u8; 8]);
    }

    #[test]
    fn file_mappings_copy_contents_from_the_offset() {
        let fx = Fixture::new(Arch::Arm64);
        fx.emu.mem_fs().add_file("blob", b"0123456789abcdef");
        let ctx = fx.call();
        let path = fx.cstr("blob");
        let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

        let flags = MapFlags::PRIVATE.bits();
        let got = sys_mmap(&ctx, GuestPtr::NULL, 8, PROT_RW, flags, fd, 4).unwrap();
        let mut head = [0u8; 8];
        fx.emu.mem_read(GuestPtr::new(got), &mut head).unwrap();
        assert_eq!(&head, b"456789ab");
    }

    #[test]
    fn short_files_fail_and_free_the_mapping() {
        let fx = Fixture::new(Arch::Arm64);
        fx.emu.mem_fs().add_file("tiny", b"xy");
        let ctx = fx.call();
        let path = fx.cstr("tiny");
        let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

        let r = sys_mmap(
            &ctx,
            GuestPtr::NULL,
            0x1000,
            PROT_RW,
            MapFlags::PRIVATE.bits(),
            fd,
            0,
        );
        assert_eq!(r, Err(Errno::ENODEV));
    }

    #[test]
    fn file_mappings_need_a_readable_descriptor() {
        let fx = Fixture::new(Arch::Arm64);
        fx.emu.mem_fs().add_file("w", b"data");
        let ctx = fx.call();
        let path = fx.cstr("w");
        let wronly = file::sys_open(&ctx, path, OpenFlags::WRONLY.bits(), 0).unwrap() as i32;

        let r = sys_mmap(
            &ctx,
            GuestPtr::NULL,
            4,
            PROT_RW,
            MapFlags::PRIVATE.bits(),
            wronly,
            0,
        );
        assert_eq!(r, Err(Errno::ENODEV));
        let bad = sys_mmap(
            &ctx,
            GuestPtr::NULL,
            4,
            PROT_RW,
            MapFlags::PRIVATE.bits(),
            99,
            0,
        );
        assert_eq!(bad, Err(Errno::EBADF));
    }

    #[test]
    fn mmap2_counts_the_offset_in_pages() {
        let fx = Fixture::new(Arch::Arm);
        let mut blob = vec![0u8; PAGE_SIZE as usize];
        blob.extend_from_slice(b"second page data");
        fx.emu.mem_fs().add_file("blob", &blob);
        let ctx = fx.call();
        let path = fx.cstr("blob");
        let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

        let got = sys_mmap2(
            &ctx,
            GuestPtr::NULL,
            16,
            PROT_RW,
            MapFlags::PRIVATE.bits(),
            fd,
            1,
        )
        .unwrap();
        let mut head = [0u8; 11];
        fx.emu.mem_read(GuestPtr::new(got), &mut head).unwrap();
        assert_eq!(&head, b"second page");
    }

    #[test]
    fn munmap_and_mprotect_forward_to_the_emulator() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let flags = (MapFlags::PRIVATE | MapFlags::ANONYMOUS).bits();
        let got = sys_mmap(&ctx, GuestPtr::NULL, 0x1000, PROT_RW, flags, -1, 0).unwrap();

        assert_eq!(sys_mprotect(&ctx, GuestPtr::new(got), 0x1000, 0x1), Ok(0));
        assert_eq!(sys_munmap(&ctx, GuestPtr::new(got), 0x1000), Ok(0));
        let mut probe = [0u8; 1];
        assert!(fx.emu.mem_read(GuestPtr::new(got), &mut probe).is_err());
        assert_eq!(
            sys_mprotect(&ctx, GuestPtr::new(got), 0x1000, 0x1),
            Err(Errno::EINVAL)
        );
    }
}
