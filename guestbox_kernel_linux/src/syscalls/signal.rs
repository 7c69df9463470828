//! Signal bookkeeping: `rt_sigaction`, `rt_sigprocmask`,
//! `rt_tgsigqueueinfo`.
//!
//! No signal is ever delivered to the guest; the kernel only maintains the
//! action table and the blocked mask on its behalf.

use std::sync::RwLock;

use hashbrown::HashMap;

use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::signal::{SigAction32, SigAction64, SigActionRecord, SigSet, Siginfo};
use guestbox_common_linux::{Errno, SigmaskHow};

use super::SyscallContext;

struct SignalState {
    set: SigSet,
    actions: HashMap<i32, SigActionRecord>,
}

/// The signal action table plus the blocked-signal mask.
pub(crate) struct SignalTable {
    inner: RwLock<SignalState>,
}

impl SignalTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(SignalState {
                set: SigSet::empty(),
                actions: HashMap::new(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn action(&self, signum: i32) -> Option<SigActionRecord> {
        self.inner.read().unwrap().actions.get(&signum).copied()
    }

    #[cfg(test)]
    pub(crate) fn blocked(&self) -> u64 {
        self.inner.read().unwrap().set.bits()
    }
}

pub(crate) fn sys_rt_sigaction<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    signum: i32,
    act: GuestPtr,
    oldact: GuestPtr,
    _sigsetsize: u64,
) -> Result<i64, Errno> {
    // The new action is read unconditionally; a null `act` faults.
    let action: SigActionRecord = if ctx.wide() {
        let act: SigAction64 = ctx.emu.read_obj(act).map_err(|_| Errno::EFAULT)?;
        act.into()
    } else {
        let act: SigAction32 = ctx.emu.read_obj(act).map_err(|_| Errno::EFAULT)?;
        act.into()
    };
    let previous = {
        let mut state = ctx.state.signals.inner.write().unwrap();
        state.actions.insert(signum, action)
    };
    // The old-action buffer is only touched when there was a previous entry.
    if let Some(previous) = previous {
        if !oldact.is_null() {
            let written = if ctx.wide() {
                ctx.emu.write_obj(oldact, &SigAction64::from(previous))
            } else {
                ctx.emu.write_obj(oldact, &SigAction32::from(previous))
            };
            if let Err(err) = written {
                log::debug!("rt_sigaction: old-action write failed: {err}");
            }
        }
    }
    Ok(0)
}

pub(crate) fn sys_rt_sigprocmask<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    how: i32,
    set: GuestPtr,
    oldset: GuestPtr,
    _sigsetsize: u64,
) -> Result<i64, Errno> {
    // Guest memory can fault, so all of it happens outside the table lock:
    // snapshot the mask, write it back, read the new set, then lock only to
    // apply the mutation.
    let current = ctx.state.signals.inner.read().unwrap().set;
    if !oldset.is_null() {
        let written = if ctx.wide() {
            ctx.emu.write_obj(oldset, &current.bits())
        } else {
            ctx.emu.write_obj(oldset, &(current.bits() as u32))
        };
        written.map_err(|_| Errno::EFAULT)?;
    }
    let value = if ctx.wide() {
        let bits: u64 = ctx.emu.read_obj(set).map_err(|_| Errno::EFAULT)?;
        SigSet::from_bits(bits)
    } else {
        let bits: u32 = ctx.emu.read_obj(set).map_err(|_| Errno::EFAULT)?;
        SigSet::from_bits(bits.into())
    };
    let mut state = ctx.state.signals.inner.write().unwrap();
    match SigmaskHow::try_from(how) {
        Ok(SigmaskHow::Block) => state.set.block(value),
        Ok(SigmaskHow::Unblock) => state.set.unblock(value),
        Ok(SigmaskHow::Setmask) => state.set = value,
        Err(_) => return Err(Errno::EINVAL),
    }
    Ok(0)
}

pub(crate) fn sys_rt_tgsigqueueinfo<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    tgid: i32,
    tid: i32,
    sig: i32,
    info: GuestPtr,
) -> Result<i64, Errno> {
    let _siginfo: Siginfo = ctx.emu.read_obj(info).map_err(|_| Errno::EFAULT)?;
    log::warn!("rt_tgsigqueueinfo({tgid}, {tid}, {sig}): queueing is not implemented");
    Err(Errno::ENOSYS)
}

#[cfg(test)]
mod tests {
    use guestbox::arch::Arch;
    use guestbox::mem::{GuestMem, GuestPtr};
    use guestbox_common_linux::signal::SigAction64;
    use guestbox_common_linux::Errno;

    use super::super::tests::Fixture;
    use super::{sys_rt_sigaction, sys_rt_sigprocmask, sys_rt_tgsigqueueinfo};

    #[test]
    fn sigaction_stores_and_returns_the_previous_action() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();

        let act = fx.emu.alloc(32);
        let oldact = fx.emu.alloc(32);
        fx.emu
            .write_obj(
                act,
                &SigAction64 {
                    handler: 0x1000,
                    flags: 4,
                    __pad: 0,
                    restorer: 0x2000,
                    mask: 0b10,
                },
            )
            .unwrap();
        // Poison the old-action buffer so an unexpected write is visible.
        fx.emu.write_obj(oldact, &[0xAAu8; 32]).unwrap();

        sys_rt_sigaction(&ctx, 17, act, oldact, 8).unwrap();
        let record = fx.state.signals.action(17).unwrap();
        assert_eq!(record.handler, 0x1000);
        assert_eq!(record.mask, 0b10);
        // No previous entry, so the buffer must be untouched.
        let untouched: [u8; 32] = fx.emu.read_obj(oldact).unwrap();
        assert_eq!(untouched, [0xAAu8; 32]);

        fx.emu
            .write_obj(
                act,
                &SigAction64 {
                    handler: 0x3000,
                    flags: 0,
                    __pad: 0,
                    restorer: 0,
                    mask: 0,
                },
            )
            .unwrap();
        sys_rt_sigaction(&ctx, 17, act, oldact, 8).unwrap();
        let previous: SigAction64 = fx.emu.read_obj(oldact).unwrap();
        assert_eq!(previous.handler, 0x1000);
        assert_eq!(previous.restorer, 0x2000);
    }

    #[test]
    fn sigaction_with_null_act_faults() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        assert_eq!(
            sys_rt_sigaction(&ctx, 2, GuestPtr::NULL, GuestPtr::NULL, 8),
            Err(Errno::EFAULT)
        );
    }

    #[test]
    fn sigprocmask_applies_all_three_behaviours() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();

        let set = fx.emu.alloc(8);
        let oldset = fx.emu.alloc(8);

        fx.emu.write_obj(set, &0b1010u64).unwrap();
        sys_rt_sigprocmask(&ctx, 1, set, GuestPtr::NULL, 8).unwrap();
        assert_eq!(fx.state.signals.blocked(), 0b1010);

        fx.emu.write_obj(set, &0b0010u64).unwrap();
        sys_rt_sigprocmask(&ctx, 2, set, oldset, 8).unwrap();
        assert_eq!(fx.state.signals.blocked(), 0b1000);
        let before: u64 = fx.emu.read_obj(oldset).unwrap();
        assert_eq!(before, 0b1010);

        fx.emu.write_obj(set, &0b0111u64).unwrap();
        sys_rt_sigprocmask(&ctx, 3, set, GuestPtr::NULL, 8).unwrap();
        assert_eq!(fx.state.signals.blocked(), 0b0111);

        assert_eq!(
            sys_rt_sigprocmask(&ctx, 9, set, GuestPtr::NULL, 8),
            Err(Errno::EINVAL)
        );
    }

    #[test]
    fn tgsigqueueinfo_validates_then_rejects() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        assert_eq!(
            sys_rt_tgsigqueueinfo(&ctx, 1, 1, 2, GuestPtr::NULL),
            Err(Errno::EFAULT)
        );
        let info = fx.emu.alloc(128);
        assert_eq!(
            sys_rt_tgsigqueueinfo(&ctx, 1, 1, 2, info),
            Err(Errno::ENOSYS)
        );
    }
}
