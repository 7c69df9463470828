//! The syscall table and argument marshalling.
//!
//! Handlers are grouped into modules by syscall family. Each family exposes
//! typed `sys_*` functions returning `Result<_, Errno>`; this module wires
//! them to the canonical [`Sysno`] tags, converts the six raw argument words,
//! and folds the result into the guest's 64-bit return convention (failure is
//! `-1` widened to `u64::MAX`, with errno recorded on the kernel instance).

pub(crate) mod file;
pub(crate) mod futex;
pub(crate) mod misc;
pub(crate) mod mm;
pub(crate) mod net;
pub(crate) mod pipe;
pub mod process;
pub(crate) mod signal;
pub(crate) mod time;

#[cfg(test)]
pub(crate) mod tests;

use guestbox::emulator::TrapContext;
use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::{Errno, Sysno};

use crate::kernel::KernelState;

/// Per-call context handed to every handler: the guest CPU context extended
/// with errno access and the kernel's shared state.
pub(crate) struct SyscallContext<'c, E: Emulator + 'static> {
    pub(crate) emu: &'static E,
    pub(crate) cpu: &'c dyn TrapContext,
    pub(crate) state: &'c KernelState,
}

impl<E: Emulator + 'static> SyscallContext<'_, E> {
    pub(crate) fn errno(&self) -> Option<Errno> {
        self.state.errno()
    }

    pub(crate) fn set_errno(&self, err: Errno) {
        self.state.set_errno(err);
    }

    /// Whether the guest ABI uses 64-bit longs and pointers.
    pub(crate) fn wide(&self) -> bool {
        self.emu.arch().is_64bit()
    }
}

/// A table entry: raw args in, raw return value out.
pub(crate) type Handler<E> = fn(&SyscallContext<'_, E>, &[u64; 6]) -> u64;

/// Look up the handler for a canonical syscall tag.
///
/// `None` makes the dispatcher yield the trap to the rest of the hook chain.
pub(crate) fn resolve<E: Emulator + 'static>(nr: Sysno) -> Option<Handler<E>> {
    Some(match nr {
        Sysno::Dup3 => emulate_dup3,
        Sysno::Fcntl => emulate_fcntl,
        Sysno::Ioctl => emulate_ioctl,
        Sysno::Faccessat => emulate_faccessat,
        Sysno::Open => emulate_open,
        Sysno::Openat => emulate_openat,
        Sysno::Close => emulate_close,
        Sysno::Pipe2 => emulate_pipe2,
        Sysno::Lseek => emulate_lseek,
        Sysno::Read => emulate_read,
        Sysno::Write => emulate_write,
        Sysno::Writev => emulate_writev,
        Sysno::Readlinkat => emulate_readlinkat,
        Sysno::Fstatat => emulate_fstatat,
        Sysno::Fstat => emulate_fstat,
        Sysno::Exit | Sysno::ExitGroup => emulate_exit,
        Sysno::Futex => emulate_futex,
        Sysno::ClockGettime => emulate_clock_gettime,
        Sysno::Sigaltstack => ignore,
        Sysno::RtSigaction => emulate_rt_sigaction,
        Sysno::RtSigprocmask => emulate_rt_sigprocmask,
        Sysno::RtTgsigqueueinfo => emulate_rt_tgsigqueueinfo,
        Sysno::Getrlimit => emulate_getrlimit,
        Sysno::Setrlimit => emulate_setrlimit,
        Sysno::Prctl => emulate_prctl,
        Sysno::Gettimeofday => emulate_gettimeofday,
        Sysno::Getpid => emulate_getpid,
        Sysno::Getuid | Sysno::Geteuid => ignore,
        Sysno::Gettid => emulate_gettid,
        Sysno::Sysinfo => emulate_sysinfo,
        Sysno::Socket => emulate_socket,
        Sysno::Munmap => emulate_munmap,
        Sysno::Clone => emulate_clone,
        Sysno::Execve => emulate_execve,
        Sysno::Mmap => emulate_mmap,
        Sysno::Mmap2 => emulate_mmap2,
        Sysno::Mprotect => emulate_mprotect,
        Sysno::Madvise => reject,
        Sysno::Getrandom => emulate_getrandom,
    })
}

/// Fold a numeric handler result into the return register convention.
fn complete<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, r: Result<i64, Errno>) -> u64 {
    match r {
        Ok(value) => value as u64,
        Err(err) => {
            ctx.set_errno(err);
            u64::MAX
        }
    }
}

/// Like [`complete`] for address-returning handlers (`mmap`); the failure
/// sentinel is the same all-ones word.
fn complete_addr<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, r: Result<u64, Errno>) -> u64 {
    match r {
        Ok(addr) => addr,
        Err(err) => {
            ctx.set_errno(err);
            u64::MAX
        }
    }
}

/// Pseudo-handler: succeed without doing anything.
fn ignore<E: Emulator + 'static>(_ctx: &SyscallContext<'_, E>, _args: &[u64; 6]) -> u64 {
    0
}

/// Pseudo-handler: fail with `ENOSYS`.
fn reject<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, _args: &[u64; 6]) -> u64 {
    ctx.set_errno(Errno::ENOSYS);
    u64::MAX
}

fn emulate_dup3<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_dup3(ctx, args[0] as i32, args[1] as i32, args[2] as u32),
    )
}

fn emulate_fcntl<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_fcntl(ctx, args[0] as i32, args[1] as u32, args[2]),
    )
}

fn emulate_ioctl<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        misc::sys_ioctl(ctx, args[0] as i32, args[1] as u32, args[2]),
    )
}

fn emulate_faccessat<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_faccessat(ctx, args[0] as i32, GuestPtr::new(args[1]), args[2] as u32),
    )
}

fn emulate_open<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_open(ctx, GuestPtr::new(args[0]), args[1] as u32, args[2] as u32),
    )
}

fn emulate_openat<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_openat(
            ctx,
            args[0] as i32,
            GuestPtr::new(args[1]),
            args[2] as u32,
            args[3] as u32,
        ),
    )
}

fn emulate_close<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(ctx, file::sys_close(ctx, args[0] as i32))
}

fn emulate_pipe2<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_pipe2(ctx, GuestPtr::new(args[0]), args[1] as u32),
    )
}

fn emulate_lseek<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_lseek(ctx, args[0] as i32, args[1] as i64, args[2] as u32),
    )
}

fn emulate_read<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_read(ctx, args[0] as i32, GuestPtr::new(args[1]), args[2]),
    )
}

fn emulate_write<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_write(ctx, args[0] as i32, GuestPtr::new(args[1]), args[2]),
    )
}

fn emulate_writev<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_writev(ctx, args[0] as i32, GuestPtr::new(args[1]), args[2] as u32),
    )
}

fn emulate_readlinkat<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_readlinkat(
            ctx,
            args[0] as i32,
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
            args[3],
        ),
    )
}

fn emulate_fstatat<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        file::sys_fstatat(
            ctx,
            args[0] as i32,
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
            args[3] as u32,
        ),
    )
}

fn emulate_fstat<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(ctx, file::sys_fstat(ctx, args[0] as i32, GuestPtr::new(args[1])))
}

fn emulate_exit<E: Emulator + 'static>(_ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    process::sys_exit(args[0] as i32)
}

fn emulate_futex<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        futex::sys_futex(
            ctx,
            GuestPtr::new(args[0]),
            args[1] as u32,
            args[2] as u32,
            GuestPtr::new(args[3]),
            GuestPtr::new(args[4]),
            args[5] as u32,
        ),
    )
}

fn emulate_clock_gettime<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    args: &[u64; 6],
) -> u64 {
    complete(ctx, time::sys_clock_gettime(ctx, args[0], GuestPtr::new(args[1])))
}

fn emulate_rt_sigaction<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        signal::sys_rt_sigaction(
            ctx,
            args[0] as i32,
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
            args[3],
        ),
    )
}

fn emulate_rt_sigprocmask<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    args: &[u64; 6],
) -> u64 {
    complete(
        ctx,
        signal::sys_rt_sigprocmask(
            ctx,
            args[0] as i32,
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
            args[3],
        ),
    )
}

fn emulate_rt_tgsigqueueinfo<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    args: &[u64; 6],
) -> u64 {
    complete(
        ctx,
        signal::sys_rt_tgsigqueueinfo(
            ctx,
            args[0] as i32,
            args[1] as i32,
            args[2] as i32,
            GuestPtr::new(args[3]),
        ),
    )
}

fn emulate_getrlimit<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        misc::sys_getrlimit(ctx, args[0] as i32, GuestPtr::new(args[1])),
    )
}

fn emulate_setrlimit<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        misc::sys_setrlimit(ctx, args[0] as i32, GuestPtr::new(args[1])),
    )
}

fn emulate_prctl<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        process::sys_prctl(ctx, args[0] as i32, args[1], args[2], args[3], args[4]),
    )
}

fn emulate_gettimeofday<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        time::sys_gettimeofday(ctx, GuestPtr::new(args[0]), GuestPtr::new(args[1])),
    )
}

fn emulate_getpid<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, _args: &[u64; 6]) -> u64 {
    complete(ctx, process::sys_getpid())
}

fn emulate_gettid<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, _args: &[u64; 6]) -> u64 {
    complete(ctx, process::sys_gettid(ctx))
}

fn emulate_sysinfo<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(ctx, misc::sys_sysinfo(ctx, GuestPtr::new(args[0])))
}

fn emulate_socket<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        net::sys_socket(ctx, args[0] as i32, args[1] as i32, args[2] as i32),
    )
}

fn emulate_munmap<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(ctx, mm::sys_munmap(ctx, GuestPtr::new(args[0]), args[1]))
}

fn emulate_clone<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        process::sys_clone(
            ctx,
            args[0] as u32,
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
            args[3],
            GuestPtr::new(args[4]),
        ),
    )
}

fn emulate_execve<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        process::sys_execve(
            GuestPtr::new(args[0]),
            GuestPtr::new(args[1]),
            GuestPtr::new(args[2]),
        ),
    )
}

fn emulate_mmap<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete_addr(
        ctx,
        mm::sys_mmap(
            ctx,
            GuestPtr::new(args[0]),
            args[1],
            args[2] as u32,
            args[3] as u32,
            args[4] as i32,
            args[5],
        ),
    )
}

fn emulate_mmap2<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete_addr(
        ctx,
        mm::sys_mmap2(
            ctx,
            GuestPtr::new(args[0]),
            args[1],
            args[2] as u32,
            args[3] as u32,
            args[4] as i32,
            args[5],
        ),
    )
}

fn emulate_mprotect<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        mm::sys_mprotect(ctx, GuestPtr::new(args[0]), args[1], args[2] as u32),
    )
}

fn emulate_getrandom<E: Emulator + 'static>(ctx: &SyscallContext<'_, E>, args: &[u64; 6]) -> u64 {
    complete(
        ctx,
        misc::sys_getrandom(ctx, GuestPtr::new(args[0]), args[1], args[2] as u32),
    )
}
