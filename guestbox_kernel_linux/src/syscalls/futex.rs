//! Futex rendezvous: `FUTEX_WAIT`, `FUTEX_WAKE`, and their bitset variants.
//!
//! Waiters block on rendezvous (capacity-0) channels keyed by guest address;
//! bitset waiters additionally listen on a channel keyed by their mask.
//! Wakers offer without blocking: `try_send` delivers only to a waiter that
//! is currently parked in `recv`, which reproduces the non-blocking offer
//! contract of `FUTEX_WAKE`. Shutting the table down drops every sender,
//! which surfaces to each waiter as a disconnect, i.e. `EPERM`.

use std::sync::RwLock;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use hashbrown::HashMap;

use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::time::{Timespec32, Timespec64};
use guestbox_common_linux::{Errno, FutexOp, FUTEX_CMD_MASK};

use super::SyscallContext;

/// One address's wait set.
struct Await {
    tx: Sender<u32>,
    rx: Receiver<u32>,
    refs: usize,
}

impl Await {
    fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self { tx, rx, refs: 0 }
    }
}

/// One bitset key's wait set.
struct BitAwait {
    tx: Sender<()>,
    rx: Receiver<()>,
    refs: usize,
}

impl BitAwait {
    fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self { tx, rx, refs: 0 }
    }
}

#[derive(Default)]
struct FutexMaps {
    awaits: HashMap<u64, Await>,
    bit_awaits: HashMap<u32, BitAwait>,
}

impl Default for Await {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BitAwait {
    fn default() -> Self {
        Self::new()
    }
}

/// All live futex rendezvous of one kernel instance.
pub(crate) struct FutexTable {
    maps: RwLock<FutexMaps>,
}

impl FutexTable {
    pub(crate) fn new() -> Self {
        Self {
            maps: RwLock::new(FutexMaps::default()),
        }
    }

    /// Register a waiter on `addr`, returning its receive side.
    fn add_await(&self, addr: u64) -> Receiver<u32> {
        let mut maps = self.maps.write().unwrap();
        let entry = maps.awaits.entry(addr).or_default();
        entry.refs += 1;
        entry.rx.clone()
    }

    /// Drop one waiter reference for `addr`, removing the entry at zero.
    fn del_await(&self, addr: u64) {
        let mut maps = self.maps.write().unwrap();
        if let Some(entry) = maps.awaits.get_mut(&addr) {
            entry.refs -= 1;
            if entry.refs == 0 {
                maps.awaits.remove(&addr);
            }
        }
    }

    /// The send side for `addr`, if anyone is waiting there.
    fn sender(&self, addr: u64) -> Option<Sender<u32>> {
        let maps = self.maps.read().unwrap();
        maps.awaits.get(&addr).map(|entry| entry.tx.clone())
    }

    /// Register a bitset waiter on `addr` with `mask`.
    fn add_bit_await(&self, addr: u64, mask: u32) -> (Receiver<u32>, Receiver<()>) {
        let mut maps = self.maps.write().unwrap();
        let addr_entry = maps.awaits.entry(addr).or_default();
        addr_entry.refs += 1;
        let rx_addr = addr_entry.rx.clone();
        let bit_entry = maps.bit_awaits.entry(mask).or_default();
        bit_entry.refs += 1;
        (rx_addr, bit_entry.rx.clone())
    }

    fn del_bit_await(&self, addr: u64, mask: u32) {
        let mut maps = self.maps.write().unwrap();
        if let Some(entry) = maps.awaits.get_mut(&addr) {
            entry.refs -= 1;
            if entry.refs == 0 {
                maps.awaits.remove(&addr);
            }
        }
        if let Some(entry) = maps.bit_awaits.get_mut(&mask) {
            entry.refs -= 1;
            if entry.refs == 0 {
                maps.bit_awaits.remove(&mask);
            }
        }
    }

    /// Deliver up to `budget` signals across every bitset entry whose key
    /// intersects `mask`. Non-blocking; the read lock is held while the
    /// offers run, which is safe because `try_send` never parks.
    fn wake_bitset(&self, mask: u32, budget: u32) -> i64 {
        let maps = self.maps.read().unwrap();
        let budget = i64::from(budget);
        let mut delivered = 0i64;
        for (bit, entry) in maps.bit_awaits.iter() {
            if bit & mask == 0 {
                continue;
            }
            while delivered != budget {
                if entry.tx.try_send(()).is_err() {
                    break;
                }
                delivered += 1;
            }
            if delivered == budget {
                break;
            }
        }
        delivered
    }

    /// Number of addresses with live waiters.
    #[cfg(test)]
    pub(crate) fn awaiting(&self) -> usize {
        self.maps.read().unwrap().awaits.len()
    }

    /// Close every channel, releasing all waiters with `EPERM`.
    pub(crate) fn shutdown(&self) {
        let mut maps = self.maps.write().unwrap();
        maps.awaits.clear();
        maps.bit_awaits.clear();
    }
}

/// Parse the optional relative timeout; `None` means wait forever.
fn read_timeout<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    utime: GuestPtr,
) -> Result<Option<Duration>, Errno> {
    if utime.is_null() {
        return Ok(None);
    }
    let (sec, nsec) = if ctx.wide() {
        let ts: Timespec64 = ctx.emu.read_obj(utime).map_err(|_| Errno::EFAULT)?;
        (ts.sec, ts.nsec)
    } else {
        let ts: Timespec32 = ctx.emu.read_obj(utime).map_err(|_| Errno::EFAULT)?;
        (ts.sec.into(), ts.nsec.into())
    };
    let nanos = sec
        .max(0)
        .saturating_mul(1_000_000_000)
        .saturating_add(nsec.max(0));
    Ok(Some(Duration::from_nanos(nanos as u64)))
}

/// The channel a timed wait races against: fires after the timeout, or never.
fn timeout_channel(timeout: Option<Duration>) -> Receiver<std::time::Instant> {
    match timeout {
        Some(d) => crossbeam_channel::after(d),
        None => crossbeam_channel::never(),
    }
}

pub(crate) fn sys_futex<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    uaddr: GuestPtr,
    op: u32,
    val: u32,
    utime: GuestPtr,
    _uaddr2: GuestPtr,
    val3: u32,
) -> Result<i64, Errno> {
    let cmd = FutexOp::try_from(op & FUTEX_CMD_MASK).map_err(|_| Errno::ENOSYS)?;
    match cmd {
        FutexOp::Wait => {
            let current: u32 = ctx.emu.read_obj(uaddr).map_err(|_| Errno::EFAULT)?;
            if current != val {
                return Err(Errno::EAGAIN);
            }
            let timeout = read_timeout(ctx, utime)?;
            let expired = timeout_channel(timeout);
            let rx = ctx.state.futex.add_await(uaddr.addr());
            let result = 'wait: loop {
                crossbeam_channel::select! {
                    recv(expired) -> _ => break 'wait Err(Errno::ETIMEDOUT),
                    recv(rx) -> word => match word {
                        Err(_) => break 'wait Err(Errno::EPERM),
                        // A delivered word still equal to the expected value
                        // counts as a stale wake; keep waiting.
                        Ok(word) if word != val => break 'wait Ok(0),
                        Ok(_) => {}
                    },
                }
            };
            ctx.state.futex.del_await(uaddr.addr());
            result
        }
        FutexOp::Wake => {
            let Some(tx) = ctx.state.futex.sender(uaddr.addr()) else {
                return Ok(0);
            };
            let current: u32 = ctx.emu.read_obj(uaddr).map_err(|_| Errno::EFAULT)?;
            let mut woken = 0i64;
            for _ in 0..val {
                if tx.try_send(current).is_err() {
                    break;
                }
                woken += 1;
            }
            Ok(woken)
        }
        FutexOp::WaitBitset => {
            let current: u32 = ctx.emu.read_obj(uaddr).map_err(|_| Errno::EFAULT)?;
            if current != val {
                return Err(Errno::EAGAIN);
            }
            let timeout = read_timeout(ctx, utime)?;
            let expired = timeout_channel(timeout);
            let (rx_addr, rx_bit) = ctx.state.futex.add_bit_await(uaddr.addr(), val3);
            let result = 'wait: loop {
                crossbeam_channel::select! {
                    recv(expired) -> _ => break 'wait Err(Errno::ETIMEDOUT),
                    recv(rx_addr) -> word => match word {
                        Err(_) => break 'wait Err(Errno::EPERM),
                        Ok(word) if word != val => break 'wait Ok(0),
                        Ok(_) => {}
                    },
                    recv(rx_bit) -> signal => match signal {
                        Err(_) => break 'wait Err(Errno::EPERM),
                        Ok(()) => {
                            // A bitset wake is only final if the word moved.
                            let word: u32 = match ctx.emu.read_obj(uaddr) {
                                Ok(word) => word,
                                Err(_) => break 'wait Err(Errno::EFAULT),
                            };
                            if word != val {
                                break 'wait Ok(0);
                            }
                        }
                    },
                }
            };
            ctx.state.futex.del_bit_await(uaddr.addr(), val3);
            result
        }
        FutexOp::WakeBitset => Ok(ctx.state.futex.wake_bitset(val3, val)),
        FutexOp::CmpRequeue => {
            log::warn!("futex: FUTEX_CMP_REQUEUE is not implemented");
            Err(Errno::ENOSYS)
        }
        other => {
            log::warn!("futex: unsupported op {other:?}");
            Err(Errno::ENOSYS)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use guestbox::arch::Arch;
    use guestbox::mem::{GuestMem, GuestPtr};
    use guestbox_common_linux::time::Timespec64;
    use guestbox_common_linux::Errno;

    use super::super::tests::Fixture;
    use super::sys_futex;

    const WAIT: u32 = 0;
    const WAKE: u32 = 1;
    const WAIT_BITSET: u32 = 9;
    const WAKE_BITSET: u32 = 10;

    fn word_at(fx: &Fixture, value: u32) -> GuestPtr {
        let addr = fx.emu.alloc(4);
        fx.emu.write_obj(addr, &value).unwrap();
        addr
    }

    #[test]
    fn wait_fails_fast_when_the_word_moved() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let addr = word_at(&fx, 7);
        let r = sys_futex(&ctx, addr, WAIT, 8, GuestPtr::NULL, GuestPtr::NULL, 0);
        assert_eq!(r, Err(Errno::EAGAIN));
    }

    #[test]
    fn wait_with_zero_timeout_expires_promptly() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let addr = word_at(&fx, 0);
        let utime = fx.emu.alloc(16);
        fx.emu
            .write_obj(utime, &Timespec64 { sec: 0, nsec: 0 })
            .unwrap();
        let r = sys_futex(&ctx, addr, WAIT, 0, utime, GuestPtr::NULL, 0);
        assert_eq!(r, Err(Errno::ETIMEDOUT));
        assert_eq!(fx.state.futex.awaiting(), 0);
    }

    #[test]
    fn wake_without_waiters_reports_zero() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let addr = word_at(&fx, 0);
        assert_eq!(
            sys_futex(&ctx, addr, WAKE, 10, GuestPtr::NULL, GuestPtr::NULL, 0),
            Ok(0)
        );
    }

    #[test]
    fn wait_and_wake_rendezvous_across_threads() {
        let fx = Fixture::new(Arch::Arm64);
        let addr = word_at(&fx, 0);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let ctx = fx.call();
                sys_futex(&ctx, addr, WAIT, 0, GuestPtr::NULL, GuestPtr::NULL, 0)
            });
            // Update the word, then wake until the offer lands.
            fx.emu.write_obj(addr, &1u32).unwrap();
            let ctx = fx.call();
            loop {
                match sys_futex(&ctx, addr, WAKE, 1, GuestPtr::NULL, GuestPtr::NULL, 0) {
                    Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                    other => {
                        assert_eq!(other, Ok(1));
                        break;
                    }
                }
            }
            assert_eq!(waiter.join().unwrap(), Ok(0));
        });
        assert_eq!(fx.state.futex.awaiting(), 0);
    }

    #[test]
    fn stale_wake_values_keep_the_waiter_parked() {
        let fx = Fixture::new(Arch::Arm64);
        let addr = word_at(&fx, 5);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let ctx = fx.call();
                sys_futex(&ctx, addr, WAIT, 5, GuestPtr::NULL, GuestPtr::NULL, 0)
            });
            let ctx = fx.call();
            // First wake delivers the unchanged word; the waiter re-blocks.
            loop {
                match sys_futex(&ctx, addr, WAKE, 1, GuestPtr::NULL, GuestPtr::NULL, 0) {
                    Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                    other => {
                        assert_eq!(other, Ok(1));
                        break;
                    }
                }
            }
            assert!(!waiter.is_finished());
            // Now the word moves and the next wake releases it.
            fx.emu.write_obj(addr, &6u32).unwrap();
            loop {
                match sys_futex(&ctx, addr, WAKE, 1, GuestPtr::NULL, GuestPtr::NULL, 0) {
                    Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                    other => {
                        assert_eq!(other, Ok(1));
                        break;
                    }
                }
            }
            assert_eq!(waiter.join().unwrap(), Ok(0));
        });
    }

    #[test]
    fn bitset_wake_matches_masks_and_rechecks_the_word() {
        let fx = Fixture::new(Arch::Arm64);
        let addr = word_at(&fx, 3);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let ctx = fx.call();
                sys_futex(
                    &ctx,
                    addr,
                    WAIT_BITSET,
                    3,
                    GuestPtr::NULL,
                    GuestPtr::NULL,
                    0b0100,
                )
            });
            let ctx = fx.call();
            // A disjoint mask reaches nobody.
            assert_eq!(
                sys_futex(&ctx, addr, WAKE_BITSET, 4, GuestPtr::NULL, GuestPtr::NULL, 0b0010),
                Ok(0)
            );
            fx.emu.write_obj(addr, &4u32).unwrap();
            loop {
                match sys_futex(&ctx, addr, WAKE_BITSET, 4, GuestPtr::NULL, GuestPtr::NULL, 0b1100)
                {
                    Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                    other => {
                        assert_eq!(other, Ok(1));
                        break;
                    }
                }
            }
            assert_eq!(waiter.join().unwrap(), Ok(0));
        });
        assert_eq!(fx.state.futex.awaiting(), 0);
    }

    #[test]
    fn shutdown_releases_waiters_with_eperm() {
        let fx = Fixture::new(Arch::Arm64);
        let addr = word_at(&fx, 0);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let ctx = fx.call();
                sys_futex(&ctx, addr, WAIT, 0, GuestPtr::NULL, GuestPtr::NULL, 0)
            });
            while fx.state.futex.awaiting() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            fx.state.futex.shutdown();
            assert_eq!(waiter.join().unwrap(), Err(Errno::EPERM));
        });
    }

    #[test]
    fn unsupported_ops_are_enosys() {
        let fx = Fixture::new(Arch::Arm64);
        let ctx = fx.call();
        let addr = word_at(&fx, 0);
        for op in [4u32, 5, 6, 7, 99] {
            assert_eq!(
                sys_futex(&ctx, addr, op, 0, GuestPtr::NULL, GuestPtr::NULL, 0),
                Err(Errno::ENOSYS)
            );
        }
    }
}
