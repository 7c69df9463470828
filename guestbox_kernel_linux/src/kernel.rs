//! Kernel construction, per-instance state, and the trap dispatcher.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use thiserror::Error;

use guestbox::arch::{arm, arm64, EXCP_SWI};
use guestbox::emulator::{HookError, HookGuard, HookResult, InterruptCallback, TrapContext};
use guestbox::mem::GuestPtr;
use guestbox::{Arch, Emulator};
use guestbox_common_linux::{Errno, Sysno};

use crate::syscalls::file::FileFlagsTable;
use crate::syscalls::futex::FutexTable;
use crate::syscalls::process::TaskRegistry;
use crate::syscalls::signal::SignalTable;
use crate::syscalls::SyscallContext;

/// Priority at which the kernel registers its interrupt hook.
const HOOK_PRIORITY: u32 = 1;

/// Errors from kernel construction.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("no trap dispatcher for {0:?} guests")]
    UnsupportedArch(Arch),
    #[error(transparent)]
    Hook(#[from] HookError),
}

/// State shared between the kernel handle and its interrupt hook.
pub(crate) struct KernelState {
    /// Last-error value, 0 when clear. Per kernel instance.
    errno: AtomicI32,
    pub(crate) files: FileFlagsTable,
    pub(crate) futex: FutexTable,
    pub(crate) signals: SignalTable,
    pub(crate) tasks: TaskRegistry,
}

impl KernelState {
    pub(crate) fn new() -> Self {
        Self {
            errno: AtomicI32::new(0),
            files: FileFlagsTable::new(),
            futex: FutexTable::new(),
            signals: SignalTable::new(),
            tasks: TaskRegistry::new(),
        }
    }

    pub(crate) fn errno(&self) -> Option<Errno> {
        Errno::try_from(self.errno.load(Ordering::Relaxed)).ok()
    }

    pub(crate) fn set_errno(&self, err: Errno) {
        self.errno.store(err.raw(), Ordering::Relaxed);
    }

    pub(crate) fn clear_errno(&self) {
        self.errno.store(0, Ordering::Relaxed);
    }
}

/// The Linux syscall emulation kernel.
///
/// Bound to exactly one emulator for its lifetime. Construction registers the
/// interrupt hook; [`close`](Self::close) (or drop) releases it and wakes any
/// futex waiters with `EPERM`.
pub struct LinuxKernel<E: Emulator + 'static> {
    emu: &'static E,
    state: Arc<KernelState>,
    hook: Option<Box<dyn HookGuard>>,
}

impl<E: Emulator + 'static> LinuxKernel<E> {
    /// Hook `emu` and build a kernel for its guest architecture.
    pub fn new(emu: &'static E) -> Result<Self, KernelError> {
        let state = Arc::new(KernelState::new());
        let callback: InterruptCallback = match emu.arch() {
            Arch::Arm => {
                let state = Arc::clone(&state);
                Box::new(move |ctx, intno| arm_interrupt(emu, &state, ctx, intno))
            }
            Arch::Arm64 => {
                let state = Arc::clone(&state);
                Box::new(move |ctx, intno| arm64_interrupt(emu, &state, ctx, intno))
            }
            arch => return Err(KernelError::UnsupportedArch(arch)),
        };
        let hook = emu.add_interrupt_hook(HOOK_PRIORITY, callback)?;
        Ok(Self {
            emu,
            state,
            hook: Some(hook),
        })
    }

    /// The emulator this kernel is bound to.
    pub fn emulator(&self) -> &'static E {
        self.emu
    }

    /// Last error recorded by a handler, if any.
    pub fn errno(&self) -> Option<Errno> {
        self.state.errno()
    }

    pub fn set_errno(&self, err: Errno) {
        self.state.set_errno(err);
    }

    pub fn clear_errno(&self) {
        self.state.clear_errno();
    }

    /// Unhook the emulator and shut the kernel down.
    ///
    /// All futex channels are closed, which releases every blocked waiter
    /// with `EPERM`.
    pub fn close(mut self) {
        self.hook.take();
        self.state.futex.shutdown();
    }
}

impl<E: Emulator + 'static> Drop for LinuxKernel<E> {
    fn drop(&mut self) {
        self.hook.take();
        self.state.futex.shutdown();
    }
}

/// Interrupt hook for 32-bit ARM guests.
fn arm_interrupt<E: Emulator + 'static>(
    emu: &'static E,
    state: &Arc<KernelState>,
    ctx: &dyn TrapContext,
    intno: u64,
) -> HookResult {
    if intno != EXCP_SWI {
        return HookResult::Next;
    }
    let mut pc_cpsr = [0u64; 2];
    if ctx
        .reg_read_batch(&[arm::PC, arm::CPSR], &mut pc_cpsr)
        .is_err()
    {
        return HookResult::Next;
    }
    let [pc, cpsr] = pc_cpsr;
    // The faulting instruction sits behind the reported PC; the SVC immediate
    // decides whether the trap is ours at all.
    if cpsr & arm::CPSR_T != 0 {
        let code: u16 = match emu.read_obj(GuestPtr::new(pc.wrapping_sub(2))) {
            Ok(code) => code,
            Err(_) => return HookResult::Next,
        };
        if code & 0xff != 0 {
            return HookResult::Next;
        }
    } else {
        let code: u32 = match emu.read_obj(GuestPtr::new(pc.wrapping_sub(4))) {
            Ok(code) => code,
            Err(_) => return HookResult::Next,
        };
        if code & 0xff_ffff != 0 {
            return HookResult::Next;
        }
    }
    let Ok(nr) = ctx.reg_read(arm::R7) else {
        return HookResult::Next;
    };
    let mut args = [0u64; 6];
    if ctx
        .reg_read_batch(
            &[arm::R0, arm::R1, arm::R2, arm::R3, arm::R4, arm::R5],
            &mut args,
        )
        .is_err()
    {
        return HookResult::Next;
    }
    dispatch(emu, state, ctx, nr, args, arm::R0)
}

/// Interrupt hook for AArch64 guests.
fn arm64_interrupt<E: Emulator + 'static>(
    emu: &'static E,
    state: &Arc<KernelState>,
    ctx: &dyn TrapContext,
    intno: u64,
) -> HookResult {
    if intno != EXCP_SWI {
        return HookResult::Next;
    }
    let Ok(pc) = ctx.reg_read(arm64::PC) else {
        return HookResult::Next;
    };
    let code: u32 = match emu.read_obj(GuestPtr::new(pc.wrapping_sub(4))) {
        Ok(code) => code,
        Err(_) => return HookResult::Next,
    };
    // SVC immediate lives in bits [20:5].
    if (code >> 5) & 0xffff != 0 {
        return HookResult::Next;
    }
    let Ok(nr) = ctx.reg_read(arm64::X8) else {
        return HookResult::Next;
    };
    let mut args = [0u64; 6];
    if ctx
        .reg_read_batch(
            &[
                arm64::X0,
                arm64::X1,
                arm64::X2,
                arm64::X3,
                arm64::X4,
                arm64::X5,
            ],
            &mut args,
        )
        .is_err()
    {
        return HookResult::Next;
    }
    dispatch(emu, state, ctx, nr, args, arm64::X0)
}

/// Common dispatch tail: table lookup, errno reset, handler call, result
/// write-back.
fn dispatch<E: Emulator + 'static>(
    emu: &'static E,
    state: &Arc<KernelState>,
    ctx: &dyn TrapContext,
    nr: u64,
    args: [u64; 6],
    result_reg: guestbox::RegId,
) -> HookResult {
    let Some(sysno) = Sysno::from_raw(emu.arch(), nr) else {
        return HookResult::Next;
    };
    let Some(handler) = crate::syscalls::resolve::<E>(sysno) else {
        return HookResult::Next;
    };
    state.clear_errno();
    let call_ctx = SyscallContext {
        emu,
        cpu: ctx,
        state,
    };
    let ret = handler(&call_ctx, &args);
    let _ = ctx.reg_write(result_reg, ret);
    HookResult::Done
}
