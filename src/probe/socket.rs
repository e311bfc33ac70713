use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::error::{Error, IoOperation, Result};

/// Receive buffer size requested from the kernel
const RECV_BUFFER_SIZE: usize = 256 * 1024;

/// Create a raw IPv4 ICMP socket.
///
/// Needs root or CAP_NET_RAW. Failure is reported with a hint on how to
/// grant the privilege.
pub fn create_raw_icmp_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
        .map_err(Error::SocketCreation)?;
    socket.set_nonblocking(false).map_err(Error::SocketCreation)?;

    // Best effort; the default buffer works for sequential probing
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        tracing::debug!(error = %e, "could not enlarge receive buffer");
    }

    Ok(socket)
}

/// Set the IP TTL for subsequent sends
pub fn set_ttl(socket: &Socket, ttl: u8) -> Result<()> {
    socket
        .set_ttl(u32::from(ttl))
        .map_err(|e| Error::io(IoOperation::SetTtl, e))
}

/// Bound the next blocking read. A zero duration would mean "block forever"
/// to the OS, so it is raised to one millisecond.
pub fn set_read_timeout(socket: &Socket, timeout: Duration) -> Result<()> {
    let timeout = timeout.max(Duration::from_millis(1));
    socket
        .set_read_timeout(Some(timeout))
        .map_err(|e| Error::io(IoOperation::SetReadTimeout, e))
}

/// Send an ICMP message to `target`
pub fn send_icmp(socket: &Socket, packet: &[u8], target: Ipv4Addr) -> Result<usize> {
    let addr = SockAddr::from(SocketAddrV4::new(target, 0));
    socket
        .send_to(packet, &addr)
        .map_err(|e| Error::io(IoOperation::SendTo, e))
}

/// Returns true if the error is the read timeout expiring
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// An extension trait to allow `recv_from` into an initialised `&mut [u8]`.
///
/// `socket2::Socket::recv_from` takes a `&mut [MaybeUninit<u8>]`.
pub trait RecvFrom {
    fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;
}

impl RecvFrom for Socket {
    // Safety: `recv_from` never writes uninitialised bytes into `buf`, so
    // viewing an initialised slice as `MaybeUninit` is sound.
    #[allow(unsafe_code)]
    fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let buf = unsafe {
            &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [std::mem::MaybeUninit<u8>])
        };
        self.recv_from(buf)
            .map(|(size, addr)| (size, addr.as_socket()))
    }
}
