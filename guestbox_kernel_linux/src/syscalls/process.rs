//! Task syscalls: `clone`, `execve`, `exit`/`exit_group`, plus `getpid`,
//! `gettid`, and `prctl`.

use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use guestbox::arch::{arm, arm64, x86, x86_64};
use guestbox::mem::GuestPtr;
use guestbox::task::GuestTask;
use guestbox::{Arch, Emulator};
use guestbox_common_linux::{CloneFlags, Errno, PR_SET_VMA};

use super::SyscallContext;

/// The payload of the controlled unwind used by `exit`/`exit_group`.
///
/// Handlers never return from an exit; the host driving the guest task
/// catches this to end the task's run.
#[derive(Debug)]
pub struct TaskExit {
    pub status: i32,
}

/// Background clones, kept alive until their reaper observes completion.
pub(crate) struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<u32, Arc<dyn GuestTask>>>>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn insert(&self, pid: u32, task: Arc<dyn GuestTask>) {
        self.tasks.write().unwrap().insert(pid, task);
    }

    fn share(&self) -> Arc<RwLock<HashMap<u32, Arc<dyn GuestTask>>>> {
        Arc::clone(&self.tasks)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, pid: u32) -> bool {
        self.tasks.read().unwrap().contains_key(&pid)
    }
}

/// The architecture's thread-pointer register.
fn tls_register(arch: Arch) -> guestbox::RegId {
    match arch {
        Arch::Arm => arm::C13_C0_3,
        Arch::Arm64 => arm64::TPIDR_EL0,
        Arch::X86 => x86::GS,
        Arch::X86_64 => x86_64::FS,
    }
}

pub(crate) fn sys_clone<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    flags: u32,
    child_stack: GuestPtr,
    _parent_tid: GuestPtr,
    tls: u64,
    child_tid: GuestPtr,
) -> Result<i64, Errno> {
    let flags = CloneFlags::from_bits_retain(flags);
    let task = ctx.cpu.fork_task().map_err(|_| Errno::EAGAIN)?;
    if child_stack.is_null() {
        if task.reset_return().is_err() {
            task.close();
            return Err(Errno::EAGAIN);
        }
    } else {
        if task.set_stack_pointer(child_stack.addr()).is_err() {
            task.close();
            return Err(Errno::EAGAIN);
        }
        // The child stack leads with `{fn, arg}` in pointer-width words.
        let call = read_entry_words(ctx, child_stack);
        let (entry, arg) = match call {
            Ok(call) => call,
            Err(err) => {
                task.close();
                return Err(err);
            }
        };
        if task.schedule_call(entry, arg).is_err() {
            task.close();
            return Err(Errno::EAGAIN);
        }
    }
    if flags.contains(CloneFlags::SETTLS) {
        let _ = task.reg_write(tls_register(ctx.emu.arch()), tls);
    }
    if task.start().is_err() {
        task.close();
        return Err(Errno::EAGAIN);
    }
    let pid = task.id();
    if !child_tid.is_null() {
        let _ = ctx.emu.write_obj(child_tid, &(pid as i32));
    }
    if flags.contains(CloneFlags::VFORK) {
        if let Err(err) = task.join() {
            log::debug!("vfork child {pid}: {err}");
        }
        task.close();
    } else {
        ctx.state.tasks.insert(pid, Arc::clone(&task));
        let registry = ctx.state.tasks.share();
        std::thread::spawn(move || {
            if let Err(err) = task.join() {
                log::debug!("task {pid}: {err}");
            }
            registry.write().unwrap().remove(&pid);
            task.close();
        });
    }
    Ok(pid.into())
}

fn read_entry_words<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    stack: GuestPtr,
) -> Result<(u64, u64), Errno> {
    if ctx.wide() {
        let words: [u64; 2] = ctx.emu.read_obj(stack).map_err(|_| Errno::EFAULT)?;
        Ok((words[0], words[1]))
    } else {
        let words: [u32; 2] = ctx.emu.read_obj(stack).map_err(|_| Errno::EFAULT)?;
        Ok((words[0].into(), words[1].into()))
    }
}

pub(crate) fn sys_execve(
    _filename: GuestPtr,
    _argv: GuestPtr,
    _envp: GuestPtr,
) -> Result<i64, Errno> {
    Err(Errno::ENOSYS)
}

/// Terminate the current task's run. Never returns.
pub(crate) fn sys_exit(status: i32) -> u64 {
    std::panic::panic_any(TaskExit { status })
}

pub(crate) fn sys_getpid() -> Result<i64, Errno> {
    Ok((std::process::id() as i32).into())
}

pub(crate) fn sys_gettid<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
) -> Result<i64, Errno> {
    Ok(ctx.cpu.task_id().into())
}

pub(crate) fn sys_prctl<E: Emulator + 'static>(
    _ctx: &SyscallContext<'_, E>,
    option: i32,
    _arg1: u64,
    _arg2: u64,
    _arg3: u64,
    _arg4: u64,
) -> Result<i64, Errno> {
    match option {
        PR_SET_VMA => Ok(0),
        _ => Err(Errno::EINVAL),
    }
}
