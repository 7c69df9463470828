//! An in-process mock emulator.
//!
//! Implements the full [`guestbox::Emulator`] contract against plain host
//! memory: a sparse page table stands in for guest RAM, contexts carry their
//! own register files, forked tasks complete instantly, and interrupt hooks
//! are delivered synchronously through [`MockEmulator::raise_interrupt`].
//! Only test suites should depend on this crate.

mod fs;
mod task;

pub use fs::{MemFileSystem, MockControlFile};
pub use task::MockTask;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashMap;

use guestbox::arch::RegId;
use guestbox::emulator::{
    FdError, FileTable, HookError, HookGuard, HookResult, HostUsageProvider, InterruptCallback,
    InterruptHooks, MemMapper, RegisterError, SocketFactory, TrapContext,
};
use guestbox::fs::{FileStat, FileSystem, FileTime, FileType, FsError, FileWrite, GuestFile};
use guestbox::host::{HostUsage, HostUsageError};
use guestbox::mem::{GuestMem, GuestPtr, MapError, MemProt, MemRegion, MemoryError};
use guestbox::net::{SocketError, SocketNetwork};
use guestbox::task::{GuestTask, TaskError};
use guestbox::{Arch, Emulator};

const PAGE_SIZE: u64 = 4096;

/// Where `map_alloc` starts handing out addresses.
const ALLOC_BASE: u64 = 0x4000_0000;

type HookList = Arc<Mutex<Vec<HookEntry>>>;

struct HookEntry {
    id: u64,
    priority: u32,
    callback: InterruptCallback,
}

/// The mock emulator. Construct once per test via [`MockEmulator::leaked`].
pub struct MockEmulator {
    arch: Arch,
    pages: RwLock<HashMap<u64, Box<[u8; PAGE_SIZE as usize]>>>,
    alloc_cursor: Mutex<u64>,
    files: Mutex<Vec<Option<Arc<dyn GuestFile>>>>,
    fs: Arc<MemFileSystem>,
    hooks: HookList,
    next_hook_id: AtomicU32,
    next_task_id: AtomicU32,
    stdout: Arc<CaptureFile>,
    stderr: Arc<CaptureFile>,
}

impl MockEmulator {
    /// Build a mock for `arch` and leak it, matching the `&'static` borrow
    /// the kernel expects from a real host.
    pub fn leaked(arch: Arch) -> &'static Self {
        let stdout = Arc::new(CaptureFile::default());
        let stderr = Arc::new(CaptureFile::default());
        let files: Vec<Option<Arc<dyn GuestFile>>> = vec![
            Some(Arc::new(NullFile)),
            Some(stdout.clone()),
            Some(stderr.clone()),
        ];
        Box::leak(Box::new(Self {
            arch,
            pages: RwLock::new(HashMap::new()),
            alloc_cursor: Mutex::new(ALLOC_BASE),
            files: Mutex::new(files),
            fs: Arc::new(MemFileSystem::new()),
            hooks: Arc::new(Mutex::new(Vec::new())),
            next_hook_id: AtomicU32::new(1),
            next_task_id: AtomicU32::new(2),
            stdout,
            stderr,
        }))
    }

    /// The in-memory file system backing [`Emulator::fs_root`].
    pub fn mem_fs(&self) -> &Arc<MemFileSystem> {
        &self.fs
    }

    /// Everything written to guest FD 1 so far.
    pub fn stdout_bytes(&self) -> Vec<u8> {
        self.stdout.contents()
    }

    /// Everything written to guest FD 2 so far.
    pub fn stderr_bytes(&self) -> Vec<u8> {
        self.stderr.contents()
    }

    /// Map pages covering `[addr, addr + data.len())` and copy `data` in.
    pub fn install(&self, addr: u64, data: &[u8]) -> GuestPtr {
        let ptr = GuestPtr::new(addr);
        self.ensure_pages(addr, data.len() as u64);
        self.mem_write(ptr, data).expect("install");
        ptr
    }

    /// Allocate zeroed guest memory for a test.
    pub fn alloc(&self, len: u64) -> GuestPtr {
        self.map_alloc(len.max(1), MemProt::ALL).expect("alloc").addr
    }

    /// A fresh trap context for a guest task.
    pub fn new_context(&'static self, task_id: u32) -> MockContext {
        MockContext {
            emu: self,
            task_id,
            regs: Mutex::new(HashMap::new()),
            forked: Mutex::new(Vec::new()),
        }
    }

    /// Deliver an interrupt to the registered hooks, highest priority
    /// (lowest number) first.
    ///
    /// A hook may unwind (the kernel's `exit` path does); the hook list
    /// recovers from the resulting poison.
    pub fn raise_interrupt(&self, ctx: &MockContext, intno: u64) -> HookResult {
        let hooks = self
            .hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut order: Vec<&HookEntry> = hooks.iter().collect();
        order.sort_by_key(|e| e.priority);
        for entry in order {
            if (entry.callback)(ctx, intno) == HookResult::Done {
                return HookResult::Done;
            }
        }
        HookResult::Next
    }

    pub(crate) fn alloc_task_id(&self) -> u32 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_pages(&self, addr: u64, len: u64) {
        let mut pages = self.pages.write().unwrap();
        let first = addr / PAGE_SIZE;
        let last = addr.saturating_add(len.max(1) - 1) / PAGE_SIZE;
        for page in first..=last {
            pages
                .entry(page)
                .or_insert_with(|| Box::new([0u8; PAGE_SIZE as usize]));
        }
    }

    fn drop_pages(&self, addr: u64, len: u64) {
        let mut pages = self.pages.write().unwrap();
        let first = addr / PAGE_SIZE;
        let last = addr.saturating_add(len.max(1) - 1) / PAGE_SIZE;
        for page in first..=last {
            pages.remove(&page);
        }
    }
}

impl GuestMem for MockEmulator {
    fn mem_read(&self, addr: GuestPtr, buf: &mut [u8]) -> Result<(), MemoryError> {
        if addr.is_null() {
            return Err(MemoryError::Unmapped(addr));
        }
        let pages = self.pages.read().unwrap();
        let mut cursor = addr.addr();
        for byte in buf.iter_mut() {
            let page = pages
                .get(&(cursor / PAGE_SIZE))
                .ok_or(MemoryError::Unmapped(GuestPtr::new(cursor)))?;
            *byte = page[(cursor % PAGE_SIZE) as usize];
            cursor += 1;
        }
        Ok(())
    }

    fn mem_write(&self, addr: GuestPtr, data: &[u8]) -> Result<(), MemoryError> {
        if addr.is_null() {
            return Err(MemoryError::Unmapped(addr));
        }
        let mut pages = self.pages.write().unwrap();
        let mut cursor = addr.addr();
        for byte in data {
            let page = pages
                .get_mut(&(cursor / PAGE_SIZE))
                .ok_or(MemoryError::Unmapped(GuestPtr::new(cursor)))?;
            page[(cursor % PAGE_SIZE) as usize] = *byte;
            cursor += 1;
        }
        Ok(())
    }
}

impl MemMapper for MockEmulator {
    fn mem_map(&self, addr: GuestPtr, len: u64, prot: MemProt) -> Result<MemRegion, MapError> {
        if addr.is_null() || len == 0 {
            return Err(MapError::Invalid);
        }
        self.ensure_pages(addr.addr(), len);
        Ok(MemRegion { addr, len, prot })
    }

    fn mem_unmap(&self, addr: GuestPtr, len: u64) -> Result<(), MapError> {
        self.drop_pages(addr.addr(), len);
        Ok(())
    }

    fn mem_protect(&self, addr: GuestPtr, len: u64, _prot: MemProt) -> Result<(), MapError> {
        let pages = self.pages.read().unwrap();
        let first = addr.addr() / PAGE_SIZE;
        let last = addr.addr().saturating_add(len.max(1) - 1) / PAGE_SIZE;
        for page in first..=last {
            if !pages.contains_key(&page) {
                return Err(MapError::Invalid);
            }
        }
        Ok(())
    }

    fn map_alloc(&self, len: u64, prot: MemProt) -> Result<MemRegion, MapError> {
        if len == 0 {
            return Err(MapError::Invalid);
        }
        let rounded = len.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        let mut cursor = self.alloc_cursor.lock().unwrap();
        let addr = *cursor;
        *cursor += rounded + PAGE_SIZE;
        drop(cursor);
        self.ensure_pages(addr, rounded);
        Ok(MemRegion {
            addr: GuestPtr::new(addr),
            len: rounded,
            prot,
        })
    }

    fn map_free(&self, addr: GuestPtr, len: u64) -> Result<(), MapError> {
        self.drop_pages(addr.addr(), len);
        Ok(())
    }
}

impl FileTable for MockEmulator {
    fn file(&self, fd: i32) -> Result<Arc<dyn GuestFile>, FdError> {
        let files = self.files.lock().unwrap();
        usize::try_from(fd)
            .ok()
            .and_then(|fd| files.get(fd)?.clone())
            .ok_or(FdError::BadDescriptor)
    }

    fn dup_file(&self, fd: i32) -> Result<i32, FdError> {
        let file = self.file(fd)?;
        self.insert_file(file)
    }

    fn dup2_file(&self, oldfd: i32, newfd: i32) -> Result<(), FdError> {
        let file = self.file(oldfd)?;
        let newfd = usize::try_from(newfd).map_err(|_| FdError::BadDescriptor)?;
        let mut files = self.files.lock().unwrap();
        if newfd >= files.len() {
            files.resize_with(newfd + 1, || None);
        }
        files[newfd] = Some(file);
        Ok(())
    }

    fn insert_file(&self, file: Arc<dyn GuestFile>) -> Result<i32, FdError> {
        let mut files = self.files.lock().unwrap();
        let idx = files.iter().position(Option::is_none).unwrap_or_else(|| {
            files.push(None);
            files.len() - 1
        });
        files[idx] = Some(file);
        i32::try_from(idx).map_err(|_| FdError::TableFull)
    }

    fn remove_file(&self, fd: i32) -> Result<Arc<dyn GuestFile>, FdError> {
        let mut files = self.files.lock().unwrap();
        usize::try_from(fd)
            .ok()
            .and_then(|fd| files.get_mut(fd)?.take())
            .ok_or(FdError::BadDescriptor)
    }
}

impl SocketFactory for MockEmulator {
    fn new_socket(&self, network: SocketNetwork) -> Result<Arc<dyn GuestFile>, SocketError> {
        Ok(Arc::new(MockSocket { network }))
    }
}

impl HostUsageProvider for MockEmulator {
    fn host_usage(&self) -> Result<HostUsage, HostUsageError> {
        Ok(HostUsage {
            uptime_secs: 321,
            loads: [1, 2, 3],
            total_ram: 8 << 30,
            free_ram: 4 << 30,
            shared_ram: 1 << 20,
            buffer_ram: 2 << 20,
            total_swap: 1 << 30,
            free_swap: 1 << 29,
            procs: 42,
        })
    }
}

impl InterruptHooks for MockEmulator {
    fn add_interrupt_hook(
        &self,
        priority: u32,
        callback: InterruptCallback,
    ) -> Result<Box<dyn HookGuard>, HookError> {
        let id = u64::from(self.next_hook_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().unwrap().push(HookEntry {
            id,
            priority,
            callback,
        });
        Ok(Box::new(MockHookGuard {
            id,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

impl Emulator for MockEmulator {
    fn arch(&self) -> Arch {
        self.arch
    }

    fn fs_root(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    fn stack_size(&self) -> u64 {
        0x0080_0000
    }
}

struct MockHookGuard {
    id: u64,
    hooks: HookList,
}

impl HookGuard for MockHookGuard {}

impl Drop for MockHookGuard {
    fn drop(&mut self) {
        self.hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|e| e.id != self.id);
    }
}

/// The CPU context of one simulated guest task.
pub struct MockContext {
    emu: &'static MockEmulator,
    task_id: u32,
    regs: Mutex<HashMap<RegId, u64>>,
    forked: Mutex<Vec<Arc<MockTask>>>,
}

impl MockContext {
    /// Set a register before raising an interrupt.
    pub fn set_reg(&self, reg: RegId, value: u64) {
        self.regs.lock().unwrap().insert(reg, value);
    }

    /// Read a register back after a syscall returns.
    pub fn reg(&self, reg: RegId) -> u64 {
        self.regs.lock().unwrap().get(&reg).copied().unwrap_or(0)
    }

    /// Every task forked from this context so far.
    pub fn forked_tasks(&self) -> Vec<Arc<MockTask>> {
        self.forked.lock().unwrap().clone()
    }
}

impl TrapContext for MockContext {
    fn reg_read(&self, reg: RegId) -> Result<u64, RegisterError> {
        Ok(self.reg(reg))
    }

    fn reg_write(&self, reg: RegId, value: u64) -> Result<(), RegisterError> {
        self.set_reg(reg, value);
        Ok(())
    }

    fn reg_read_batch(&self, regs: &[RegId], out: &mut [u64]) -> Result<(), RegisterError> {
        for (slot, reg) in out.iter_mut().zip(regs) {
            *slot = self.reg(*reg);
        }
        Ok(())
    }

    fn task_id(&self) -> u32 {
        self.task_id
    }

    fn fork_task(&self) -> Result<Arc<dyn GuestTask>, TaskError> {
        let snapshot = self.regs.lock().unwrap().clone();
        let task = Arc::new(MockTask::new(self.emu.alloc_task_id(), snapshot));
        self.forked.lock().unwrap().push(task.clone());
        Ok(task)
    }
}

/// FD 0 in the mock table: readable, always at end of file.
struct NullFile;

impl GuestFile for NullFile {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: 0o666,
            file_type: FileType::CharDevice,
            size: 0,
            mtime: FileTime::default(),
        })
    }

    fn as_reader(&self) -> Option<&dyn guestbox::fs::FileRead> {
        Some(&NULL_READER)
    }
}

struct NullReader;
static NULL_READER: NullReader = NullReader;

impl guestbox::fs::FileRead for NullReader {
    fn read(&self, _buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(0)
    }
}

/// FDs 1 and 2 in the mock table: append-only capture buffers.
#[derive(Default)]
struct CaptureFile {
    data: Mutex<Vec<u8>>,
}

impl CaptureFile {
    fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl GuestFile for CaptureFile {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: 0o666,
            file_type: FileType::CharDevice,
            size: self.data.lock().unwrap().len() as i64,
            mtime: FileTime::default(),
        })
    }

    fn as_writer(&self) -> Option<&dyn FileWrite> {
        Some(self)
    }
}

impl FileWrite for CaptureFile {
    fn write(&self, buf: &[u8]) -> Result<usize, FsError> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// A socket stub; just remembers what network it was created on.
pub struct MockSocket {
    network: SocketNetwork,
}

impl MockSocket {
    pub fn network(&self) -> SocketNetwork {
        self.network
    }
}

impl GuestFile for MockSocket {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: 0o777,
            file_type: FileType::Socket,
            size: 0,
            mtime: FileTime::default(),
        })
    }
}
