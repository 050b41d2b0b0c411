//! Socket plumbing shared by both endpoint modes: outbound dials with a
//! timeout and assembly of the layered pipe a session runs over.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use compress::{CompressedReader, CompressedWriter};
use secure::{EncryptedReader, EncryptedWriter};

/// Turns a configured listen endpoint into a bindable address; a bare
/// `:port` means all interfaces.
pub(crate) fn listen_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// The address to poke a listener on so its acceptor can observe the
/// close flag: the bound address itself, or loopback for a wildcard bind.
pub(crate) fn wake_address(mut addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        match addr.ip() {
            IpAddr::V4(_) => addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            IpAddr::V6(_) => addr.set_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        }
    }
    addr
}

/// Connects to `addr`, trying every resolved address with the given
/// timeout.
pub(crate) fn dial(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();

    let mut last_err = None;
    for a in &addrs {
        match TcpStream::connect_timeout(a, timeout) {
            Ok(socket) => return Ok(socket),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address found for {}", addr),
        )
    }))
}

/// Wraps a freshly connected socket in the tunnel transport stack:
/// encryption always, compression when configured. Returns the read and
/// write halves the session will drive, plus a handle for shutting the
/// socket down underneath them.
pub(crate) fn pipe_pair(
    socket: TcpStream,
    password: &[u8],
    compress: bool,
) -> io::Result<(Box<dyn Read + Send>, Box<dyn Write + Send>, TcpStream)> {
    let control = socket.try_clone()?;
    let read_half = socket.try_clone()?;
    let write_half = socket;

    let reader = EncryptedReader::new(read_half, password);
    let writer = EncryptedWriter::new(write_half, password);

    if compress {
        Ok((
            Box::new(CompressedReader::new(reader)),
            Box::new(CompressedWriter::new(writer)),
            control,
        ))
    } else {
        Ok((Box::new(reader), Box::new(writer), control))
    }
}
