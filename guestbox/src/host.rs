//! Host usage snapshots, consumed verbatim by the guest `sysinfo` syscall.

use thiserror::Error;

/// A point-in-time summary of the host machine.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostUsage {
    pub uptime_secs: u64,
    /// 1/5/15-minute load averages in the kernel's fixed-point encoding.
    pub loads: [u64; 3],
    pub total_ram: u64,
    pub free_ram: u64,
    pub shared_ram: u64,
    pub buffer_ram: u64,
    pub total_swap: u64,
    pub free_swap: u64,
    /// Number of processes on the host.
    pub procs: u16,
}

/// Errors surfaced while sampling host usage.
#[derive(Error, Debug)]
pub enum HostUsageError {
    #[error("host usage information unavailable")]
    Unavailable,
}
