//! Instantly-completing mock guest tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use hashbrown::HashMap;

use guestbox::arch::RegId;
use guestbox::emulator::RegisterError;
use guestbox::task::{GuestTask, TaskError};

/// A forked task. Starting it completes it immediately; the interesting part
/// for tests is the CPU state the kernel shaped before the start.
pub struct MockTask {
    id: u32,
    regs: Mutex<HashMap<RegId, u64>>,
    stack_pointer: Mutex<Option<u64>>,
    scheduled: Mutex<Option<(u64, u64)>>,
    reset_return: AtomicBool,
    started: AtomicBool,
    closed: AtomicBool,
    done: (Mutex<bool>, Condvar),
}

impl MockTask {
    pub(crate) fn new(id: u32, regs: HashMap<RegId, u64>) -> Self {
        Self {
            id,
            regs: Mutex::new(regs),
            stack_pointer: Mutex::new(None),
            scheduled: Mutex::new(None),
            reset_return: AtomicBool::new(false),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            done: (Mutex::new(false), Condvar::new()),
        }
    }

    pub fn reg(&self, reg: RegId) -> Option<u64> {
        self.regs.lock().unwrap().get(&reg).copied()
    }

    pub fn stack_pointer(&self) -> Option<u64> {
        *self.stack_pointer.lock().unwrap()
    }

    /// The `(entry, arg)` pair handed to [`GuestTask::schedule_call`].
    pub fn scheduled_call(&self) -> Option<(u64, u64)> {
        *self.scheduled.lock().unwrap()
    }

    pub fn was_reset_return(&self) -> bool {
        self.reset_return.load(Ordering::SeqCst)
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl GuestTask for MockTask {
    fn id(&self) -> u32 {
        self.id
    }

    fn reg_write(&self, reg: RegId, value: u64) -> Result<(), RegisterError> {
        self.regs.lock().unwrap().insert(reg, value);
        Ok(())
    }

    fn set_stack_pointer(&self, sp: u64) -> Result<(), RegisterError> {
        *self.stack_pointer.lock().unwrap() = Some(sp);
        Ok(())
    }

    fn reset_return(&self) -> Result<(), TaskError> {
        self.reset_return.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn schedule_call(&self, entry: u64, arg: u64) -> Result<(), TaskError> {
        *self.scheduled.lock().unwrap() = Some((entry, arg));
        Ok(())
    }

    fn start(&self) -> Result<(), TaskError> {
        self.started.store(true, Ordering::SeqCst);
        let (done, cvar) = &self.done;
        *done.lock().unwrap() = true;
        cvar.notify_all();
        Ok(())
    }

    fn join(&self) -> Result<(), TaskError> {
        let (done, cvar) = &self.done;
        let mut finished = done.lock().unwrap();
        while !*finished {
            finished = cvar.wait(finished).unwrap();
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
