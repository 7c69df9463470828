//! Shared fixtures and cross-cutting handler tests.

use guestbox::arch::Arch;
use guestbox::emulator::FileTable;
use guestbox::fs::FileTime;
use guestbox::mem::{GuestMem, GuestPtr};
use guestbox_common_linux::stat::{Stat3264, Stat64};
use guestbox_common_linux::{Errno, FcntlCmd, IoVec64, OpenFlags, AT_FDCWD, S_IFREG};
use guestbox_emulator_mock::{MemFileSystem, MockContext, MockEmulator};

use crate::kernel::KernelState;

use super::{file, net, SyscallContext};

/// One mock emulator plus one kernel state, the way a handler sees them.
pub(crate) struct Fixture {
    pub(crate) emu: &'static MockEmulator,
    pub(crate) ctx: MockContext,
    pub(crate) state: KernelState,
}

impl Fixture {
    pub(crate) fn new(arch: Arch) -> Self {
        let emu = MockEmulator::leaked(arch);
        let ctx = emu.new_context(1);
        Self {
            emu,
            ctx,
            state: KernelState::new(),
        }
    }

    pub(crate) fn call(&self) -> SyscallContext<'_, MockEmulator> {
        SyscallContext {
            emu: self.emu,
            cpu: &self.ctx,
            state: &self.state,
        }
    }

    /// Copy a NUL-terminated path into guest memory.
    pub(crate) fn cstr(&self, s: &str) -> GuestPtr {
        let ptr = self.emu.alloc((s.len() + 1) as u64);
        self.emu
            .mem_write(ptr, s.as_bytes())
            .and_then(|()| self.emu.mem_write(ptr.add(s.len() as u64), &[0]))
            .expect("cstr");
        ptr
    }
}

#[test]
fn open_and_close_keep_tables_in_lockstep() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("/etc/passwd", b"root:x:0:0\n");
    let ctx = fx.call();

    let path = fx.cstr("/etc/passwd");
    let fd = file::sys_open(&ctx, path, OpenFlags::CLOEXEC.bits(), 0).unwrap() as i32;
    assert!(fx.emu.file(fd).is_ok());
    assert_eq!(fx.state.files.get(fd), OpenFlags::CLOEXEC);
    assert_eq!(ctx.errno(), None);

    file::sys_close(&ctx, fd).unwrap();
    assert!(fx.emu.file(fd).is_err());
    assert_eq!(fx.state.files.len(), 0);

    assert_eq!(file::sys_close(&ctx, fd), Err(Errno::EBADF));
}

#[test]
fn openat_missing_path_leaves_flag_table_alone() {
    let fx = Fixture::new(Arch::Arm64);
    let ctx = fx.call();
    let path = fx.cstr("/etc/passwd");
    let r = file::sys_openat(&ctx, AT_FDCWD, path, OpenFlags::CLOEXEC.bits(), 0);
    assert_eq!(r, Err(Errno::ENOENT));
    assert_eq!(fx.state.files.len(), 0);
}

#[test]
fn openat_honours_directory_descriptors() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("data/conf", b"k=v");
    let ctx = fx.call();

    let dir = MemFileSystem::dir_file(fx.emu.mem_fs());
    let dirfd = fx.emu.insert_file(dir).unwrap();
    let path = fx.cstr("data/conf");
    let fd = file::sys_openat(&ctx, dirfd, path, 0, 0).unwrap();
    assert!(fd >= 0);

    // A plain file is not a directory base.
    let notdir = file::sys_openat(&ctx, fd as i32, path, 0, 0);
    assert_eq!(notdir, Err(Errno::ENOTDIR));
}

#[test]
fn exclusive_create_on_existing_path_is_eexist() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("tmp/lock", b"");
    let ctx = fx.call();
    let path = fx.cstr("tmp/lock");
    let flags = OpenFlags::CREAT | OpenFlags::EXCL;
    assert_eq!(
        file::sys_open(&ctx, path, flags.bits(), 0o600),
        Err(Errno::EEXIST)
    );
}

#[test]
fn fcntl_covers_flag_commands_and_locks() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("f", b"x");
    let ctx = fx.call();
    let path = fx.cstr("f");
    let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

    assert_eq!(file::sys_fcntl(&ctx, fd, FcntlCmd::Getfd as u32, 0), Ok(0));
    file::sys_fcntl(&ctx, fd, FcntlCmd::Setfd as u32, 0).unwrap();
    assert_eq!(file::sys_fcntl(&ctx, fd, FcntlCmd::Getfd as u32, 0), Ok(1));

    file::sys_fcntl(&ctx, fd, FcntlCmd::Setfl as u32, OpenFlags::APPEND.bits().into()).unwrap();
    assert_eq!(
        file::sys_fcntl(&ctx, fd, FcntlCmd::Getfl as u32, 0),
        Ok(OpenFlags::APPEND.bits() as i64)
    );

    // Lock commands succeed without doing anything.
    assert_eq!(file::sys_fcntl(&ctx, fd, FcntlCmd::Setlkw as u32, 0), Ok(0));
    assert_eq!(file::sys_fcntl(&ctx, fd, FcntlCmd::Getlk64 as u32, 0), Ok(0));

    // F_DUPFD copies the stored flags onto the new descriptor.
    let dup = file::sys_fcntl(&ctx, fd, FcntlCmd::Dupfd as u32, 0).unwrap() as i32;
    assert_ne!(dup, fd);
    assert_eq!(fx.state.files.get(dup), fx.state.files.get(fd));

    assert_eq!(
        file::sys_fcntl(&ctx, fd, FcntlCmd::Setown as u32, 0),
        Err(Errno::ENOSYS)
    );
    assert_eq!(file::sys_fcntl(&ctx, 99, 0, 0), Err(Errno::EBADF));
}

#[test]
fn dup3_takes_flags_from_the_argument() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("f", b"x");
    let ctx = fx.call();
    let path = fx.cstr("f");
    let fd = file::sys_open(&ctx, path, OpenFlags::CLOEXEC.bits(), 0).unwrap() as i32;

    let newfd = fd + 7;
    assert_eq!(
        file::sys_dup3(&ctx, fd, newfd, 0),
        Ok(i64::from(newfd))
    );
    assert_eq!(fx.state.files.get(newfd), OpenFlags::empty());
    assert_eq!(file::sys_dup3(&ctx, 99, 100, 0), Err(Errno::EBADF));
}

#[test]
fn pipe2_round_trips_bytes_between_its_descriptors() {
    let fx = Fixture::new(Arch::Arm64);
    let ctx = fx.call();

    let fds_ptr = fx.emu.alloc(8);
    file::sys_pipe2(&ctx, fds_ptr, OpenFlags::CLOEXEC.bits()).unwrap();
    let fds: [i32; 2] = fx.emu.read_obj(fds_ptr).unwrap();
    let [rfd, wfd] = fds;
    assert_eq!(fx.state.files.get(rfd), OpenFlags::CLOEXEC);
    assert_eq!(fx.state.files.get(wfd), OpenFlags::CLOEXEC);

    let data = fx.emu.install(0x9000, b"ping");
    assert_eq!(file::sys_write(&ctx, wfd, data, 4), Ok(4));

    let sink = fx.emu.alloc(8);
    assert_eq!(file::sys_read(&ctx, rfd, sink, 4), Ok(4));
    let mut back = [0u8; 4];
    fx.emu.mem_read(sink, &mut back).unwrap();
    assert_eq!(&back, b"ping");

    // Pipes cannot seek.
    assert_eq!(file::sys_lseek(&ctx, rfd, 0, 0), Err(Errno::EINVAL));
}

#[test]
fn read_write_respect_capabilities() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("log", b"");
    let ctx = fx.call();

    let path = fx.cstr("log");
    let rdonly = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;
    let data = fx.emu.install(0xa000, b"denied");
    assert_eq!(file::sys_write(&ctx, rdonly, data, 6), Err(Errno::EINTR));

    let wronly =
        file::sys_open(&ctx, path, OpenFlags::WRONLY.bits(), 0).unwrap() as i32;
    assert_eq!(file::sys_write(&ctx, wronly, data, 6), Ok(6));
    assert_eq!(fx.emu.mem_fs().read_back("log").unwrap(), b"denied");

    let sink = fx.emu.alloc(16);
    assert_eq!(file::sys_read(&ctx, wronly, sink, 6), Err(Errno::EINTR));
    assert_eq!(file::sys_read(&ctx, 99, sink, 1), Err(Errno::EBADF));

    // Reading past end of file is a short read, not an error.
    let rd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;
    assert_eq!(file::sys_read(&ctx, rd, sink, 64), Ok(6));
}

#[test]
fn writev_gathers_segments_in_order() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("out", b"");
    let ctx = fx.call();
    let path = fx.cstr("out");
    let fd = file::sys_open(&ctx, path, OpenFlags::WRONLY.bits(), 0).unwrap() as i32;

    let seg0 = fx.emu.install(0xb000, b"hello ");
    let seg1 = fx.emu.install(0xc000, b"world");
    let iov = fx.emu.alloc(32);
    fx.emu
        .write_obj(
            iov,
            &[
                IoVec64 {
                    base: seg0.addr(),
                    len: 6,
                },
                IoVec64 {
                    base: seg1.addr(),
                    len: 5,
                },
            ],
        )
        .unwrap();
    assert_eq!(file::sys_writev(&ctx, fd, iov, 2), Ok(11));
    assert_eq!(fx.emu.mem_fs().read_back("out").unwrap(), b"hello world");
}

#[test]
fn lseek_moves_the_cursor_with_all_whence_modes() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_file("f", b"0123456789");
    let ctx = fx.call();
    let path = fx.cstr("f");
    let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

    assert_eq!(file::sys_lseek(&ctx, fd, 4, 0), Ok(4));
    assert_eq!(file::sys_lseek(&ctx, fd, 2, 1), Ok(6));
    assert_eq!(file::sys_lseek(&ctx, fd, -1, 2), Ok(9));
    assert_eq!(file::sys_lseek(&ctx, fd, 0, 7), Err(Errno::EINVAL));

    let sink = fx.emu.alloc(4);
    assert_eq!(file::sys_read(&ctx, fd, sink, 4), Ok(1));
}

#[test]
fn readlinkat_truncates_to_the_buffer() {
    let fx = Fixture::new(Arch::Arm64);
    fx.emu.mem_fs().add_symlink("bin/sh", "/system/bin/mksh");
    let ctx = fx.call();

    let path = fx.cstr("bin/sh");
    let buf = fx.emu.alloc(32);
    assert_eq!(file::sys_readlinkat(&ctx, AT_FDCWD, path, buf, 32), Ok(16));
    assert_eq!(file::sys_readlinkat(&ctx, AT_FDCWD, path, buf, 7), Ok(7));
    let mut head = [0u8; 7];
    fx.emu.mem_read(buf, &mut head).unwrap();
    assert_eq!(&head, b"/system");

    let missing = fx.cstr("no/such/link");
    assert_eq!(
        file::sys_readlinkat(&ctx, AT_FDCWD, missing, buf, 32),
        Err(Errno::EINVAL)
    );
}

#[test]
fn fstat_reports_mode_size_and_mtime() {
    let fx = Fixture::new(Arch::Arm64);
    let mtime = FileTime { sec: 1_700_000_000, nsec: 250 };
    fx.emu
        .mem_fs()
        .add_file_with("answer", &[0u8; 42], 0o640, mtime);
    let ctx = fx.call();
    let path = fx.cstr("answer");
    let fd = file::sys_open(&ctx, path, 0, 0).unwrap() as i32;

    let statbuf = fx.emu.alloc(128);
    file::sys_fstat(&ctx, fd, statbuf).unwrap();
    let stat: Stat64 = fx.emu.read_obj(statbuf).unwrap();
    assert_eq!(stat.st_mode & 0xF000, S_IFREG);
    assert_eq!(stat.st_mode & 0o777, 0o640);
    assert_eq!(stat.st_size, 42);
    assert_eq!(stat.st_atim.sec, 1_700_000_000);
    assert_eq!(stat.st_atim.nsec, 250);
    assert_eq!(stat.st_mtim.sec, stat.st_ctim.sec);
    assert_eq!(stat.st_blocks, 0);

    assert_eq!(file::sys_fstat(&ctx, 99, statbuf), Err(Errno::EBADF));
}

#[test]
fn fstatat_uses_the_narrow_layout_on_32_bit_guests() {
    let fx = Fixture::new(Arch::Arm);
    let mtime = FileTime { sec: 99, nsec: 7 };
    fx.emu.mem_fs().add_file_with("f", b"abc", 0o644, mtime);
    let ctx = fx.call();

    let path = fx.cstr("f");
    let statbuf = fx.emu.alloc(96);
    file::sys_fstatat(&ctx, AT_FDCWD, path, statbuf, 0).unwrap();
    let stat: Stat3264 = fx.emu.read_obj(statbuf).unwrap();
    assert_eq!({ stat.st_mode } & 0xF000, S_IFREG);
    assert_eq!({ stat.st_size }, 3);
    assert_eq!({ stat.st_mtime }, 99);
    assert_eq!({ stat.st_mtime_nsec }, 7);
}

#[test]
fn socket_maps_domains_and_strips_type_flags() {
    use guestbox_common_linux::{AF_INET, AF_LOCAL, SOCK_DGRAM, SOCK_STREAM};

    let fx = Fixture::new(Arch::Arm64);
    let ctx = fx.call();

    let fd = net::sys_socket(&ctx, AF_INET, SOCK_STREAM | 0x80000, 0).unwrap();
    assert!(fx.emu.file(fd as i32).is_ok());

    assert!(net::sys_socket(&ctx, AF_LOCAL, SOCK_STREAM, 0).is_ok());
    assert!(net::sys_socket(&ctx, AF_LOCAL, SOCK_DGRAM, 0).is_ok());
    assert_eq!(net::sys_socket(&ctx, 16, 3, 0), Err(Errno::EAFNOSUPPORT));
}
