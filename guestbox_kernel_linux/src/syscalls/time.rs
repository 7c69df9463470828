//! Wall-clock syscalls: `clock_gettime` and `gettimeofday`.
//!
//! Host time is used verbatim; monotonic clocks are measured against a base
//! instant captured on first use.

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::time::{
    Timespec32, Timespec64, Timeval32, Timeval64, Timezone, CLOCK_BOOTTIME, CLOCK_MONOTONIC,
    CLOCK_MONOTONIC_COARSE, CLOCK_MONOTONIC_RAW, CLOCK_REALTIME, CLOCK_REALTIME_COARSE,
};
use guestbox_common_linux::Errno;

use super::SyscallContext;

fn monotonic_now() -> Duration {
    static BASE: OnceLock<Instant> = OnceLock::new();
    BASE.get_or_init(Instant::now).elapsed()
}

fn wall_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

pub(crate) fn sys_clock_gettime<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    clockid: u64,
    tp: GuestPtr,
) -> Result<i64, Errno> {
    let now = match clockid {
        CLOCK_REALTIME | CLOCK_REALTIME_COARSE => wall_now(),
        CLOCK_MONOTONIC | CLOCK_MONOTONIC_RAW | CLOCK_MONOTONIC_COARSE | CLOCK_BOOTTIME => {
            monotonic_now()
        }
        _ => return Err(Errno::EINVAL),
    };
    let written = if ctx.wide() {
        ctx.emu.write_obj(
            tp,
            &Timespec64 {
                sec: now.as_secs() as i64,
                nsec: now.subsec_nanos().into(),
            },
        )
    } else {
        ctx.emu.write_obj(
            tp,
            &Timespec32 {
                sec: now.as_secs() as i32,
                nsec: now.subsec_nanos() as i32,
            },
        )
    };
    written.map_err(|_| Errno::EFAULT)?;
    Ok(0)
}

pub(crate) fn sys_gettimeofday<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    tv: GuestPtr,
    tz: GuestPtr,
) -> Result<i64, Errno> {
    if !tv.is_null() {
        let now = wall_now();
        let written = if ctx.wide() {
            ctx.emu.write_obj(
                tv,
                &Timeval64 {
                    sec: now.as_secs() as i64,
                    usec: now.subsec_micros().into(),
                },
            )
        } else {
            ctx.emu.write_obj(
                tv,
                &Timeval32 {
                    sec: now.as_secs() as i32,
                    usec: now.subsec_micros() as i32,
                },
            )
        };
        written.map_err(|_| Errno::EFAULT)?;
    }
    if !tz.is_null() {
        // Timezone reporting is vestigial; the struct is written zeroed.
        ctx.emu
            .write_obj(tz, &Timezone::default())
            .map_err(|_| Errno::EFAULT)?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use guestbox::arch::Arch;
    use guestbox::mem::{GuestMem, GuestPtr};
    use guestbox_common_linux::time::{Timespec32, Timespec64, Timeval64, Timezone};
    use guestbox_common_linux::Errno;

    use super::super::tests::Fixture;
    use super::{sys_clock_gettime, sys_gettimeofday};

    #[test]
    fn realtime_clock_reads_the_wall_clock() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let tp = fx.emu.alloc(16);
        sys_clock_gettime(&ctx, 0, tp).unwrap();
        let ts: Timespec64 = fx.emu.read_obj(tp).unwrap();
        // Sometime after 2020.
        assert!(ts.sec > 1_577_836_800);
        assert!(ts.nsec < 1_000_000_000);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let tp = fx.emu.alloc(16);
        sys_clock_gettime(&ctx, 1, tp).unwrap();
        let first: Timespec64 = fx.emu.read_obj(tp).unwrap();
        sys_clock_gettime(&ctx, 1, tp).unwrap();
        let second: Timespec64 = fx.emu.read_obj(tp).unwrap();
        assert!((second.sec, second.nsec) >= (first.sec, first.nsec));
    }

    #[test]
    fn narrow_guests_get_narrow_timespecs() {
        let fx = Fixture::new(Arch::Arm);
        let ctx = fx.call();
        let tp = fx.emu.alloc(8);
        sys_clock_gettime(&ctx, 0, tp).unwrap();
        let ts: Timespec32 = fx.emu.read_obj(tp).unwrap();
        assert!(ts.sec > 0);
    }

    #[test]
    fn unknown_clocks_are_einval() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let tp = fx.emu.alloc(16);
        assert_eq!(sys_clock_gettime(&ctx, 17, tp), Err(Errno::EINVAL));
    }

    #[test]
    fn gettimeofday_writes_time_and_a_zeroed_timezone() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let tv = fx.emu.alloc(16);
        let tz = fx.emu.alloc(8);
        fx.emu.write_obj(tz, &Timezone { minuteswest: 99, dsttime: 99 }).unwrap();
        sys_gettimeofday(&ctx, tv, tz).unwrap();
        let time: Timeval64 = fx.emu.read_obj(tv).unwrap();
        assert!(time.sec > 1_577_836_800);
        assert!(time.usec < 1_000_000);
        let zone: Timezone = fx.emu.read_obj(tz).unwrap();
        assert_eq!(zone.minuteswest, 0);

        // Null pointers are simply skipped.
        sys_gettimeofday(&ctx, GuestPtr::NULL, GuestPtr::NULL).unwrap();
    }
}
