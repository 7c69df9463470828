//! File and descriptor syscalls: `open*`, `close`, `dup3`, `fcntl`,
//! `pipe2`, `lseek`, `read`/`write`/`writev`, `readlinkat`, and the two
//! `stat` families.

use std::io::SeekFrom;
use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use guestbox::fs::{FileFlags, FileStat, FileSystem, FileType, FsError, GuestFile};
use guestbox::mem::GuestPtr;
use guestbox::Emulator;
use guestbox_common_linux::stat::{Stat3264, Stat64};
use guestbox_common_linux::time::Timespec64;
use guestbox_common_linux::{
    Errno, FcntlCmd, IoVec32, IoVec64, OpenFlags, AT_FDCWD, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO,
    S_IFLNK, S_IFREG, S_IFSOCK,
};

use super::{pipe, SyscallContext};

/// The per-descriptor guest flag table.
///
/// Every key is a descriptor that is simultaneously live in the emulator's
/// own table; entries are inserted in lockstep with descriptor creation and
/// removed before `close` returns.
pub(crate) struct FileFlagsTable {
    flags: RwLock<HashMap<i32, OpenFlags>>,
}

impl FileFlagsTable {
    pub(crate) fn new() -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, fd: i32, flags: OpenFlags) {
        self.flags.write().unwrap().insert(fd, flags);
    }

    pub(crate) fn get(&self, fd: i32) -> OpenFlags {
        self.flags
            .read()
            .unwrap()
            .get(&fd)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn remove(&self, fd: i32) {
        self.flags.write().unwrap().remove(&fd);
    }

    /// Copy the flags of `from` onto `to` (used by `F_DUPFD`).
    fn copy(&self, from: i32, to: i32) {
        let mut flags = self.flags.write().unwrap();
        let value = flags.get(&from).copied().unwrap_or_default();
        flags.insert(to, value);
    }

    fn set_cloexec(&self, fd: i32) {
        let mut flags = self.flags.write().unwrap();
        let entry = flags.entry(fd).or_default();
        *entry |= OpenFlags::CLOEXEC;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.flags.read().unwrap().len()
    }
}

/// Translate guest open-flag bits into the host file-system flag set.
fn to_file_flags(flags: OpenFlags) -> FileFlags {
    let mut ff = FileFlags::empty();
    if flags.contains(OpenFlags::WRONLY) {
        ff = FileFlags::WRONLY;
    }
    if flags.contains(OpenFlags::RDWR) {
        ff = FileFlags::RDWR;
    }
    if flags.contains(OpenFlags::APPEND) {
        ff |= FileFlags::APPEND;
    }
    if flags.contains(OpenFlags::CREAT) {
        ff |= FileFlags::CREATE;
    }
    if flags.contains(OpenFlags::EXCL) {
        ff |= FileFlags::EXCL;
    }
    if flags.contains(OpenFlags::SYNC) {
        ff |= FileFlags::SYNC;
    }
    if flags.contains(OpenFlags::TRUNC) {
        ff |= FileFlags::TRUNC;
    }
    ff
}

fn open_error(err: FsError) -> Errno {
    match err {
        FsError::AlreadyExists => Errno::EEXIST,
        _ => Errno::ENOENT,
    }
}

/// The directory base of an `*at` syscall: either the FS root or a live
/// directory descriptor.
enum DirBase {
    Root(Arc<dyn FileSystem>),
    Fd(Arc<dyn GuestFile>),
}

impl DirBase {
    fn fs(&self) -> Result<&dyn FileSystem, Errno> {
        match self {
            DirBase::Root(fs) => Ok(fs.as_ref()),
            DirBase::Fd(file) => file.as_dir().ok_or(Errno::ENOTDIR),
        }
    }
}

fn resolve_dir<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    dfd: i32,
) -> Result<DirBase, Errno> {
    if dfd == AT_FDCWD {
        Ok(DirBase::Root(ctx.emu.fs_root()))
    } else {
        let file = ctx.emu.file(dfd).map_err(|_| Errno::EBADF)?;
        Ok(DirBase::Fd(file))
    }
}

fn register_file<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    file: Arc<dyn GuestFile>,
    flags: OpenFlags,
) -> Result<i64, Errno> {
    let fd = ctx.emu.insert_file(file).map_err(|_| Errno::EMFILE)?;
    ctx.state.files.insert(fd, flags);
    Ok(fd.into())
}

pub(crate) fn sys_open<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    filename: GuestPtr,
    flags: u32,
    mode: u32,
) -> Result<i64, Errno> {
    let path = ctx.emu.read_cstring(filename).map_err(|_| Errno::ENOENT)?;
    let flags = OpenFlags::from_bits_retain(flags);
    let file = ctx
        .emu
        .fs_root()
        .open(&path, to_file_flags(flags), mode)
        .map_err(open_error)?;
    register_file(ctx, file, flags)
}

pub(crate) fn sys_openat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    dfd: i32,
    filename: GuestPtr,
    flags: u32,
    mode: u32,
) -> Result<i64, Errno> {
    let path = ctx.emu.read_cstring(filename).map_err(|_| Errno::ENOENT)?;
    let flags = OpenFlags::from_bits_retain(flags);
    let dir = resolve_dir(ctx, dfd)?;
    let file = dir
        .fs()?
        .open(&path, to_file_flags(flags), mode)
        .map_err(open_error)?;
    register_file(ctx, file, flags)
}

pub(crate) fn sys_faccessat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    dfd: i32,
    filename: GuestPtr,
    mode: u32,
) -> Result<i64, Errno> {
    let path = ctx.emu.read_cstring(filename).map_err(|_| Errno::ENOENT)?;
    let dir = resolve_dir(ctx, dfd)?;
    let file = dir
        .fs()?
        .open(&path, FileFlags::empty(), mode)
        .map_err(|_| Errno::ENOENT)?;
    if let Err(err) = file.close() {
        log::debug!("faccessat: close failed: {err}");
    }
    Ok(0)
}

pub(crate) fn sys_close<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
) -> Result<i64, Errno> {
    let file = ctx.emu.remove_file(fd).map_err(|_| Errno::EBADF)?;
    ctx.state.files.remove(fd);
    if let Err(err) = file.close() {
        log::debug!("close({fd}): {err}");
    }
    Ok(0)
}

pub(crate) fn sys_dup3<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    oldfd: i32,
    newfd: i32,
    flags: u32,
) -> Result<i64, Errno> {
    ctx.emu
        .dup2_file(oldfd, newfd)
        .map_err(|_| Errno::EBADF)?;
    // Flags of the new descriptor come from the syscall argument, not from
    // the old entry.
    ctx.state
        .files
        .insert(newfd, OpenFlags::from_bits_retain(flags));
    Ok(newfd.into())
}

pub(crate) fn sys_fcntl<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    cmd: u32,
    arg: u64,
) -> Result<i64, Errno> {
    ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    match FcntlCmd::try_from(cmd) {
        Ok(FcntlCmd::Dupfd) => {
            let newfd = ctx.emu.dup_file(fd).map_err(|_| Errno::EBADF)?;
            ctx.state.files.copy(fd, newfd);
            Ok(newfd.into())
        }
        Ok(FcntlCmd::Getfd) => {
            let cloexec = ctx.state.files.get(fd).contains(OpenFlags::CLOEXEC);
            Ok(cloexec.into())
        }
        Ok(FcntlCmd::Setfd) => {
            ctx.state.files.set_cloexec(fd);
            Ok(0)
        }
        Ok(FcntlCmd::Getfl) => Ok((ctx.state.files.get(fd).bits() as i32).into()),
        Ok(FcntlCmd::Setfl) => {
            ctx.state
                .files
                .insert(fd, OpenFlags::from_bits_retain(arg as u32));
            Ok(0)
        }
        Ok(
            FcntlCmd::Getlk
            | FcntlCmd::Setlk
            | FcntlCmd::Setlkw
            | FcntlCmd::Getlk64
            | FcntlCmd::Setlk64
            | FcntlCmd::Setlkw64,
        ) => Ok(0),
        other => {
            log::warn!("fcntl: unsupported command {cmd} ({other:?})");
            Err(Errno::ENOSYS)
        }
    }
}

pub(crate) fn sys_pipe2<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fildes: GuestPtr,
    flags: u32,
) -> Result<i64, Errno> {
    let flags = OpenFlags::from_bits_retain(flags);
    let (reader, writer) = pipe::pipe();
    let rfd = ctx.emu.insert_file(reader).map_err(|_| Errno::EMFILE)?;
    let wfd = match ctx.emu.insert_file(writer) {
        Ok(fd) => fd,
        Err(_) => {
            let _ = ctx.emu.remove_file(rfd);
            return Err(Errno::EMFILE);
        }
    };
    ctx.state.files.insert(rfd, flags);
    ctx.state.files.insert(wfd, flags);
    ctx.emu
        .write_obj(fildes, &[rfd, wfd])
        .map_err(|_| Errno::EFAULT)?;
    Ok(0)
}

pub(crate) fn sys_lseek<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    offset: i64,
    whence: u32,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let seeker = file.as_seeker().ok_or(Errno::EINVAL)?;
    let target = match whence {
        0 => SeekFrom::Start(offset as u64),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return Err(Errno::EINVAL),
    };
    let pos = seeker.seek(target).map_err(|_| Errno::EINVAL)?;
    Ok(pos as i64)
}

pub(crate) fn sys_read<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    buf: GuestPtr,
    count: u64,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let reader = file.as_reader().ok_or(Errno::EINTR)?;
    let mut chunk = [0u8; 4096];
    let mut done = 0u64;
    while done < count {
        let want = chunk.len().min((count - done) as usize);
        let n = reader.read(&mut chunk[..want]).map_err(|_| Errno::EIO)?;
        if n == 0 {
            break;
        }
        ctx.emu
            .mem_write(buf.add(done), &chunk[..n])
            .map_err(|_| Errno::EIO)?;
        done += n as u64;
    }
    Ok(done as i64)
}

/// Push all of `data` through a writer, tolerating short writes.
fn write_all(writer: &dyn guestbox::fs::FileWrite, mut data: &[u8]) -> Result<(), FsError> {
    while !data.is_empty() {
        let n = writer.write(data)?;
        if n == 0 {
            return Err(FsError::Io);
        }
        data = &data[n..];
    }
    Ok(())
}

pub(crate) fn sys_write<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    buf: GuestPtr,
    count: u64,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let writer = file.as_writer().ok_or(Errno::EINTR)?;
    let mut chunk = [0u8; 4096];
    let mut done = 0u64;
    while done < count {
        let take = chunk.len().min((count - done) as usize);
        ctx.emu
            .mem_read(buf.add(done), &mut chunk[..take])
            .map_err(|_| Errno::EIO)?;
        write_all(writer, &chunk[..take]).map_err(|_| Errno::EIO)?;
        done += take as u64;
    }
    Ok(done as i64)
}

pub(crate) fn sys_writev<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    iov: GuestPtr,
    iovcnt: u32,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let writer = file.as_writer().ok_or(Errno::EINTR)?;
    let mut total = 0i64;
    for i in 0..u64::from(iovcnt) {
        let (base, len) = if ctx.wide() {
            let vec: IoVec64 = ctx
                .emu
                .read_obj(iov.add(i * 16))
                .map_err(|_| Errno::EFAULT)?;
            (vec.base, vec.len)
        } else {
            let vec: IoVec32 = ctx
                .emu
                .read_obj(iov.add(i * 8))
                .map_err(|_| Errno::EFAULT)?;
            (vec.base.into(), vec.len.into())
        };
        let mut chunk = [0u8; 4096];
        let mut done = 0u64;
        while done < len {
            let take = chunk.len().min((len - done) as usize);
            ctx.emu
                .mem_read(GuestPtr::new(base + done), &mut chunk[..take])
                .map_err(|_| Errno::EIO)?;
            write_all(writer, &chunk[..take]).map_err(|_| Errno::EIO)?;
            done += take as u64;
        }
        total += len as i64;
    }
    Ok(total)
}

pub(crate) fn sys_readlinkat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    dfd: i32,
    filename: GuestPtr,
    buf: GuestPtr,
    bufsiz: u64,
) -> Result<i64, Errno> {
    let path = ctx.emu.read_cstring(filename).map_err(|_| Errno::ENOENT)?;
    let root;
    let dir_file;
    let readlink = if dfd == AT_FDCWD {
        root = ctx.emu.fs_root();
        root.as_readlink().ok_or(Errno::EINVAL)?
    } else {
        dir_file = ctx.emu.file(dfd).map_err(|_| Errno::EBADF)?;
        dir_file
            .as_dir()
            .and_then(|dir| dir.as_readlink())
            .ok_or(Errno::ENOTDIR)?
    };
    let link = readlink.read_link(&path).map_err(|_| Errno::EINVAL)?;
    let size = (link.len() as u64).min(bufsiz);
    // Not NUL-terminated; the guest gets at most `bufsiz` bytes.
    ctx.emu
        .mem_write(buf, &link.as_bytes()[..size as usize])
        .map_err(|_| Errno::EFAULT)?;
    Ok(size as i64)
}

/// `st_mode` from permission bits plus the single file-type macro.
fn mode_bits(info: &FileStat) -> u32 {
    let type_bits = match info.file_type {
        FileType::CharDevice => S_IFCHR,
        FileType::BlockDevice => S_IFBLK,
        FileType::Directory => S_IFDIR,
        FileType::NamedPipe => S_IFIFO,
        FileType::Symlink => S_IFLNK,
        FileType::Socket => S_IFSOCK,
        FileType::Regular => S_IFREG,
    };
    (info.perm & 0o7777) | type_bits
}

fn write_stat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    statbuf: GuestPtr,
    info: &FileStat,
) -> Result<i64, Errno> {
    if ctx.wide() {
        let ts = Timespec64 {
            sec: info.mtime.sec,
            nsec: info.mtime.nsec,
        };
        let stat = Stat64 {
            st_mode: mode_bits(info),
            st_size: info.size,
            st_atim: ts,
            st_mtim: ts,
            st_ctim: ts,
            ..Stat64::default()
        };
        ctx.emu.write_obj(statbuf, &stat).map_err(|_| Errno::EFAULT)?;
    } else {
        let stat = Stat3264 {
            st_mode: mode_bits(info),
            st_size: info.size,
            st_atime: info.mtime.sec as u32,
            st_atime_nsec: info.mtime.nsec as u32,
            st_mtime: info.mtime.sec as u32,
            st_mtime_nsec: info.mtime.nsec as u32,
            st_ctime: info.mtime.sec as u32,
            st_ctime_nsec: info.mtime.nsec as u32,
            ..Stat3264::default()
        };
        ctx.emu.write_obj(statbuf, &stat).map_err(|_| Errno::EFAULT)?;
    }
    Ok(0)
}

pub(crate) fn sys_fstatat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    dfd: i32,
    filename: GuestPtr,
    statbuf: GuestPtr,
    _flag: u32,
) -> Result<i64, Errno> {
    let path = ctx.emu.read_cstring(filename).map_err(|_| Errno::ENOENT)?;
    let dir = resolve_dir(ctx, dfd)?;
    let info = dir.fs()?.stat(&path).map_err(|_| Errno::ENOENT)?;
    write_stat(ctx, statbuf, &info)
}

pub(crate) fn sys_fstat<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    fd: i32,
    statbuf: GuestPtr,
) -> Result<i64, Errno> {
    let file = ctx.emu.file(fd).map_err(|_| Errno::EBADF)?;
    let info = file.stat().map_err(|_| Errno::ENOENT)?;
    write_stat(ctx, statbuf, &info)
}
