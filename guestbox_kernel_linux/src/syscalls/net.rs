//! The `socket` syscall: map a guest `(domain, type)` pair onto a host
//! network and register the result as a descriptor.

use guestbox::net::SocketNetwork;
use guestbox::Emulator;
use guestbox_common_linux::{
    Errno, AF_INET, AF_INET6, AF_LOCAL, SOCK_DGRAM, SOCK_STREAM, SOCK_TYPE_MASK,
};

use super::SyscallContext;

pub(crate) fn sys_socket<E: Emulator + 'static>(
    ctx: &SyscallContext<'_, E>,
    domain: i32,
    r#type: i32,
    _protocol: i32,
) -> Result<i64, Errno> {
    // High bits of `type` carry flags (CLOEXEC, NONBLOCK); drop them.
    let r#type = r#type & SOCK_TYPE_MASK;
    let network = match (domain, r#type) {
        (AF_LOCAL, SOCK_STREAM) => SocketNetwork::Unix,
        (AF_LOCAL, SOCK_DGRAM) => SocketNetwork::UnixDatagram,
        (AF_INET | AF_INET6, SOCK_STREAM) => SocketNetwork::Tcp,
        (AF_INET | AF_INET6, SOCK_DGRAM) => SocketNetwork::Udp,
        _ => return Err(Errno::EAFNOSUPPORT),
    };
    let socket = ctx.emu.new_socket(network).map_err(|_| Errno::EACCES)?;
    let fd = ctx.emu.insert_file(socket).map_err(|_| Errno::EMFILE)?;
    Ok(fd.into())
}
