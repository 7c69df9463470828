//! Miscellaneous syscalls: `getrandom`, `sysinfo`, `ioctl`, and the rlimit
//! pair.

use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::{Errno, Rlimit64, RngFlags, Sysinfo, RLIMIT_STACK};

use super::SyscallContext;

/// A small, fast, decidedly non-cryptographic generator (SplitMix64).
struct FastRng(u64);

impl FastRng {
    fn new_from_seed(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

fn shared_rng() -> &'static Mutex<FastRng> {
    static RANDOM: OnceLock<Mutex<FastRng>> = OnceLock::new();
    RANDOM.get_or_init(|| {
        let clock = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Mutex::new(FastRng::new_from_seed(0x4d59_5df4_d0f3_3173 ^ clock))
    })
}

/// Cap on how much the non-`GRND_RANDOM` path produces per call.
const GETRANDOM_CHUNK: u64 = 256;

pub(crate) fn sys_getrandom<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    buf: GuestPtr,
    count: u64,
    flags: u32,
) -> Result<i64, Errno> {
    let flags = RngFlags::from_bits_retain(flags);
    // The "blocking pool" path fills the whole request; the default path
    // hands out at most one chunk and reports the short count.
    let produce = if flags.contains(RngFlags::RANDOM) {
        count
    } else {
        count.min(GETRANDOM_CHUNK)
    };
    let mut rng = shared_rng().lock().unwrap();
    let mut written = 0u64;
    while written < produce {
        let word = rng.next_u64().to_ne_bytes();
        let take = word.len().min((produce - written) as usize);
        ctx.emu
            .mem_write(buf.add(written), &word[..take])
            .map_err(|_| Errno::EFAULT)?;
        written += take as u64;
    }
    Ok(produce as i64)
}

pub(crate) fn sys_sysinfo<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    info: GuestPtr,
) -> Result<i64, Errno> {
    let usage = ctx.emu.host_usage().map_err(|_| Errno::EINVAL)?;
    let sysinfo = Sysinfo {
        uptime: usage.uptime_secs as i64,
        loads: usage.loads,
        totalram: usage.total_ram,
        freeram: usage.free_ram,
        sharedram: usage.shared_ram,
        bufferram: usage.buffer_ram,
        totalswap: usage.total_swap,
        freeswap: usage.free_swap,
        procs: usage.procs,
        ..Sysinfo::default()
    };
    ctx.emu
        .write_obj(info, &sysinfo)
        .map_err(|_| Errno::EINVAL)?;
    Ok(0)
}

pub(crate) fn sys_ioctl<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    cmd: u32,
    arg: u64,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let control = file.as_control().ok_or(Errno::ENOTTY)?;
    control.control(cmd, arg).map_err(|_| Errno::EINVAL)?;
    Ok(0)
}

pub(crate) fn sys_getrlimit<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    resource: i32,
    rlim: GuestPtr,
) -> Result<i64, Errno> {
    if resource == RLIMIT_STACK {
        let stack = ctx.emu.stack_size();
        let limit = Rlimit64 {
            rlim_cur: stack,
            rlim_max: stack,
        };
        ctx.emu.write_obj(rlim, &limit).map_err(|_| Errno::EFAULT)?;
    }
    // Other resources are a conscious no-op.
    Ok(0)
}

pub(crate) fn sys_setrlimit<E: Emulator + 'static>(
    _ctx: &SyscallContext<'_, E>,
    _resource: i32,
    _rlim: GuestPtr,
) -> Result<i64, Errno> {
    Ok(0)
}

#[cfg(test)]
mod tests {
    use guestbox::arch::Arch;
    use guestbox::emulator::FileTable;
    use guestbox::mem::GuestMem;
    use guestbox::Emulator;
    use guestbox_common_linux::{Errno, Rlimit64, RngFlags, Sysinfo, RLIMIT_STACK};
    use guestbox_emulator_mock::MockControlFile;

    use super::super::tests::Fixture;
    use super::{sys_getrandom, sys_getrlimit, sys_ioctl, sys_sysinfo};

    #[test]
    fn getrandom_fills_and_caps_the_default_path() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();

        let buf = fx.emu.alloc(1024);
        assert_eq!(sys_getrandom(&ctx, buf, 16, 0), Ok(16));
        let bytes: [u8; 16] = fx.emu.read_obj(buf).unwrap();
        assert_ne!(bytes, [0u8; 16]);

        // The default pool hands out at most 256 bytes per call.
        assert_eq!(sys_getrandom(&ctx, buf, 1000, 0), Ok(256));
        assert_eq!(
            sys_getrandom(&ctx, buf, 1000, RngFlags::RANDOM.bits()),
            Ok(1000)
        );
    }

    #[test]
    fn sysinfo_copies_the_host_snapshot() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let info = fx.emu.alloc(128);
        sys_sysinfo(&ctx, info).unwrap();
        let sysinfo: Sysinfo = fx.emu.read_obj(info).unwrap();
        assert_eq!(sysinfo.uptime, 321);
        assert_eq!(sysinfo.totalram, 8 << 30);
        assert_eq!(sysinfo.procs, 42);
    }

    #[test]
    fn ioctl_requires_the_control_capability() {
        let fx = Fixture::new(Arch::Arm64);
        fx.emu.mem_fs().add_file("plain", b"");
        let ctx = fx.call();

        let ctl = MockControlFile::new();
        let fd = fx.emu.insert_file(ctl.clone()).unwrap();
        assert_eq!(sys_ioctl(&ctx, fd, 0x5401, 0x10), Ok(0));
        assert_eq!(ctl.calls(), vec![(0x5401, 0x10)]);

        let failing = MockControlFile::failing();
        let bad = fx.emu.insert_file(failing).unwrap();
        assert_eq!(sys_ioctl(&ctx, bad, 1, 0), Err(Errno::EINVAL));

        let path = fx.cstr("plain");
        let plain = super::super::file::sys_open(&ctx, path, 0, 0).unwrap() as i32;
        assert_eq!(sys_ioctl(&ctx, plain, 1, 0), Err(Errno::ENOTTY));
        assert_eq!(sys_ioctl(&ctx, 99, 1, 0), Err(Errno::EBADF));
    }

    #[test]
    fn getrlimit_reports_the_stack_size() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let rlim = fx.emu.alloc(16);
        sys_getrlimit(&ctx, RLIMIT_STACK, rlim).unwrap();
        let limit: Rlimit64 = fx.emu.read_obj(rlim).unwrap();
        assert_eq!(limit.rlim_cur, fx.emu.stack_size());
        assert_eq!(limit.rlim_cur, limit.rlim_max);

        // Other resources succeed without writing anything.
        let untouched = fx.emu.alloc(16);
        sys_getrlimit(&ctx, 7, untouched).unwrap();
        let zeros: Rlimit64 = fx.emu.read_obj(untouched).unwrap();
        assert_eq!(zeros.rlim_cur, 0);
    }
}
