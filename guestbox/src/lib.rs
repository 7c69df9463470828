//! # guestbox
//!
//! The contract between a CPU emulator / debugger host and the guestbox Linux
//! syscall kernel.
//!
//! The kernel in `guestbox_kernel_linux` owns none of the machinery it drives:
//! CPU state, guest memory, the file-descriptor table, the file system, and
//! the task scheduler all belong to the host. This crate defines the traits
//! the host implements to lend that machinery out — an [`Emulator`] is merely
//! a collection of narrow provider traits, composed the same way a platform
//! provider is assembled from subtraits.
//!
//! Everything here is borrowed by the kernel for its lifetime; nothing is
//! owned or torn down by it.

pub mod arch;
pub mod emulator;
pub mod fs;
pub mod host;
pub mod mem;
pub mod net;
pub mod task;

pub use arch::{Arch, RegId};
pub use emulator::{Emulator, HookGuard, HookResult, InterruptCallback, TrapContext};
pub use mem::{GuestPtr, MemProt};
