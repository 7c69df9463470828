//! The socket factory lent out by the host.

use thiserror::Error;

/// The host network a guest socket maps onto.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SocketNetwork {
    Unix,
    UnixDatagram,
    Tcp,
    Udp,
}

/// Errors surfaced by socket creation.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("socket creation refused by host")]
    Refused,
    #[error("network not supported by host")]
    Unsupported,
}
