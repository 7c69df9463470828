//! The [`Emulator`] trait and its provider subtraits.
//!
//! An emulator is assembled from narrow providers — memory, mapping, the
//! descriptor table, sockets, host usage, interrupt hooks — plus a handful of
//! top-level queries. The kernel binds to exactly one emulator for its
//! lifetime and holds it as a non-owning `&'static` borrow, the same way a
//! platform provider is held by the subsystems built on top of it.

use std::sync::Arc;

use thiserror::Error;

use crate::arch::{Arch, RegId};
use crate::fs::{FileSystem, GuestFile};
use crate::host::{HostUsage, HostUsageError};
use crate::mem::{GuestMem, GuestPtr, MapError, MemProt, MemRegion};
use crate::net::{SocketError, SocketNetwork};
use crate::task::{GuestTask, TaskError};

/// Errors surfaced by register access.
#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("unknown register id {0:?} for this core")]
    Unknown(RegId),
}

/// Errors surfaced by descriptor-table operations.
#[derive(Error, Debug)]
pub enum FdError {
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("descriptor table full")]
    TableFull,
}

/// Errors surfaced by hook registration.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("emulator rejected hook registration")]
    Rejected,
}

/// What an interrupt hook tells the emulator to do next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookResult {
    /// Let the remaining hooks observe the interrupt.
    Next,
    /// The interrupt is consumed; resume the guest.
    Done,
}

/// The CPU context of the guest task that raised an interrupt.
///
/// Delivered to interrupt hooks; also the seam through which a handler forks
/// new guest tasks, since a fork always clones the *current* task.
pub trait TrapContext {
    fn reg_read(&self, reg: RegId) -> Result<u64, RegisterError>;

    fn reg_write(&self, reg: RegId, value: u64) -> Result<(), RegisterError>;

    /// Read several registers at once into `out` (same length as `regs`).
    fn reg_read_batch(&self, regs: &[RegId], out: &mut [u64]) -> Result<(), RegisterError>;

    /// Id of the guest task this context belongs to.
    fn task_id(&self) -> u32;

    /// Fork a new suspended task from this one.
    fn fork_task(&self) -> Result<Arc<dyn GuestTask>, TaskError>;
}

/// An interrupt hook: `(context, interrupt number) -> HookResult`.
///
/// Hooks may be invoked concurrently from any host thread that is driving a
/// guest task.
pub type InterruptCallback = Box<dyn Fn(&dyn TrapContext, u64) -> HookResult + Send + Sync>;

/// A registered hook. Dropping the guard unregisters the hook.
pub trait HookGuard: Send {}

/// Guest virtual-memory mapping operations.
pub trait MemMapper {
    /// Map exactly at `addr`.
    fn mem_map(&self, addr: GuestPtr, len: u64, prot: MemProt) -> Result<MemRegion, MapError>;

    /// Unmap `[addr, addr+len)`. Unmapped holes are tolerated.
    fn mem_unmap(&self, addr: GuestPtr, len: u64) -> Result<(), MapError>;

    /// Change the protection of `[addr, addr+len)`.
    fn mem_protect(&self, addr: GuestPtr, len: u64, prot: MemProt) -> Result<(), MapError>;

    /// Map `len` bytes at a host-chosen free address.
    fn map_alloc(&self, len: u64, prot: MemProt) -> Result<MemRegion, MapError>;

    /// Release a region obtained from [`mem_map`] or [`map_alloc`].
    ///
    /// [`mem_map`]: MemMapper::mem_map
    /// [`map_alloc`]: MemMapper::map_alloc
    fn map_free(&self, addr: GuestPtr, len: u64) -> Result<(), MapError>;
}

/// The host-owned file-descriptor table.
pub trait FileTable {
    /// Look up a live descriptor.
    fn file(&self, fd: i32) -> Result<Arc<dyn GuestFile>, FdError>;

    /// Duplicate `fd` onto the lowest free descriptor.
    fn dup_file(&self, fd: i32) -> Result<i32, FdError>;

    /// Duplicate `oldfd` onto exactly `newfd`, closing what was there.
    fn dup2_file(&self, oldfd: i32, newfd: i32) -> Result<(), FdError>;

    /// Insert a file, returning its new descriptor.
    fn insert_file(&self, file: Arc<dyn GuestFile>) -> Result<i32, FdError>;

    /// Remove `fd` from the table, handing ownership back to the caller.
    /// The caller is responsible for [`GuestFile::close`].
    fn remove_file(&self, fd: i32) -> Result<Arc<dyn GuestFile>, FdError>;
}

/// The socket factory.
pub trait SocketFactory {
    /// Create a socket on `network`, as a guest file.
    fn new_socket(&self, network: SocketNetwork) -> Result<Arc<dyn GuestFile>, SocketError>;
}

/// Host usage sampling for `sysinfo`.
pub trait HostUsageProvider {
    fn host_usage(&self) -> Result<HostUsage, HostUsageError>;
}

/// Interrupt-hook registration.
pub trait InterruptHooks {
    /// Register `callback` for hardware interrupts at `priority` (lower runs
    /// first). The returned guard unregisters on drop.
    fn add_interrupt_hook(
        &self,
        priority: u32,
        callback: InterruptCallback,
    ) -> Result<Box<dyn HookGuard>, HookError>;
}

/// A complete emulator/debugger handle.
pub trait Emulator:
    GuestMem
    + MemMapper
    + FileTable
    + SocketFactory
    + HostUsageProvider
    + InterruptHooks
    + Send
    + Sync
{
    /// The guest architecture.
    fn arch(&self) -> Arch;

    /// The file system used for path resolution outside any directory FD.
    fn fs_root(&self) -> Arc<dyn FileSystem>;

    /// The stack size given to guest tasks, reported via `getrlimit`.
    fn stack_size(&self) -> u64;
}
