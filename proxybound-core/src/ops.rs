//! The injected "real primitives" capability.
//!
//! However the host resolved the unhooked socket calls (dlsym, a test
//! double, anything else), the core sees them only through this trait. The
//! socket type is whatever the host hands us, as long as the engine can
//! read and write handshake bytes through it.

use std::io::{self, IoSlice, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

pub trait RealOps {
    type Socket: Read + Write;

    /// The unhooked connect, applied to the caller's own socket and bounded
    /// by `timeout`. The same socket may be reconnected after a failed
    /// attempt; that is how dynamic chains restart.
    fn connect(
        &self,
        sock: &mut Self::Socket,
        addr: &SocketAddr,
        timeout: Duration,
    ) -> io::Result<()>;

    /// Bound applied to every subsequent read on the socket.
    fn set_read_timeout(
        &self,
        sock: &mut Self::Socket,
        timeout: Option<Duration>,
    ) -> io::Result<()>;

    fn bind(&self, sock: &mut Self::Socket, addr: &SocketAddr) -> io::Result<()>;

    fn send(&self, sock: &mut Self::Socket, buf: &[u8]) -> io::Result<usize>;

    fn sendto(
        &self,
        sock: &mut Self::Socket,
        buf: &[u8],
        addr: Option<&SocketAddr>,
    ) -> io::Result<usize>;

    fn sendmsg(
        &self,
        sock: &mut Self::Socket,
        bufs: &[IoSlice<'_>],
        addr: Option<&SocketAddr>,
    ) -> io::Result<usize>;

    /// True forward resolution, used only when the proxy resolver is off.
    fn getaddrinfo(&self, node: &str, service: Option<&str>) -> io::Result<Vec<SocketAddr>>;

    /// True reverse resolution, used only when the proxy resolver is off.
    fn getnameinfo(&self, addr: &SocketAddr) -> io::Result<(String, String)>;
}
