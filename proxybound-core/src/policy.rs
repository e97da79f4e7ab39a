//! Traffic admission: decide per socket operation whether it goes straight
//! through, gets redirected into the chain, or is refused as a leak.

use crate::chain::Destination;
use proxybound_common::{is_dns_port, lookup_synthetic, Config, ProxyboundError};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// Address family of the caller's socket, as seen by the hook layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    Inet,
    Inet6,
    /// Unix sockets, netlink, anything that is not IP.
    Other,
}

/// Socket type of the caller's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockKind {
    Stream,
    Datagram,
    Raw,
    Other,
    /// The type could not be read back from the socket at all.
    Unknown,
}

/// Metadata the interposition layer hands us alongside each operation.
#[derive(Debug, Clone, Copy)]
pub struct SocketMeta {
    pub family: AddrFamily,
    pub kind: SockKind,
}

impl SocketMeta {
    pub fn stream_inet() -> Self {
        SocketMeta {
            family: AddrFamily::Inet,
            kind: SockKind::Stream,
        }
    }

    pub fn dgram_inet() -> Self {
        SocketMeta {
            family: AddrFamily::Inet,
            kind: SockKind::Datagram,
        }
    }
}

/// Outcome of admission.
#[derive(Debug)]
pub enum Verdict {
    /// Call the real primitive untouched.
    Direct,
    /// Route through the proxy chain toward this destination.
    Redirect(Destination),
    /// Refuse the operation; the error carries the errno to set.
    Reject(ProxyboundError),
}

fn is_loopback(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.octets()[0] == 127,
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

fn matches_localnet(config: &Config, addr: IpAddr, port: u16) -> bool {
    let IpAddr::V4(v4) = addr else { return false };
    config.localnet.iter().any(|net| net.contains(v4, port))
}

/// Classify an outbound connection attempt.
pub fn classify(config: &Config, meta: SocketMeta, dest: &SocketAddr) -> Verdict {
    // A socket whose type cannot even be queried is not ours to police.
    if meta.kind == SockKind::Unknown {
        return Verdict::Direct;
    }
    if meta.family == AddrFamily::Other {
        debug!("connect: non-IP family, passing through");
        return Verdict::Direct;
    }

    let addr = dest.ip();
    let port = dest.port();

    if matches_localnet(config, addr, port) {
        debug!("connect: {} matches localnet exclusion", addr);
        return Verdict::Direct;
    }

    // A synthetic destination is a deferred hostname; recover it. An
    // address in the subnet that was never allocated is a crafted value and
    // must not slip through to the network.
    if let IpAddr::V4(v4) = addr {
        if config.is_synthetic(v4) {
            return match lookup_synthetic(v4) {
                Some(hostname) => {
                    Verdict::Redirect(Destination::named(hostname, addr, port))
                }
                None => Verdict::Reject(ProxyboundError::InvalidDestination(format!(
                    "{} is in the remote-DNS subnet but was never allocated",
                    v4
                ))),
            };
        }
    }

    if is_loopback(addr) {
        debug!("connect: loopback destination, passing through");
        return Verdict::Direct;
    }

    if meta.kind != SockKind::Stream {
        if config.allow_leak {
            debug!("connect: non-stream socket allowed by allow_leak");
            return Verdict::Direct;
        }
        if config.allow_dns && is_dns_port(port) {
            debug!("connect: non-stream name-service traffic allowed to port {}", port);
            return Verdict::Direct;
        }
        return Verdict::Reject(ProxyboundError::PolicyRejected(format!(
            "non-stream connect to {} would bypass the chain",
            dest
        )));
    }

    Verdict::Redirect(Destination::numeric(addr, port))
}

/// Classify a bind request. Binds are never proxied; anything the connect
/// policy would have redirected is refused instead.
pub fn classify_bind(config: &Config, meta: SocketMeta, local: &SocketAddr) -> Verdict {
    // Wildcard binds are how listeners come up; they touch no remote
    // network and always pass.
    if local.ip().is_unspecified() {
        return Verdict::Direct;
    }
    match classify(config, meta, local) {
        Verdict::Redirect(_) => Verdict::Reject(ProxyboundError::PolicyRejected(format!(
            "bind to non-local address {} cannot be proxied",
            local
        ))),
        other => other,
    }
}

/// Classify a send-family operation (`send`, `sendto`, `sendmsg`).
///
/// Applied uniformly to all four: a datagram to a non-excluded, non-local,
/// non-name-service destination is a leak unless leaks are allowed.
pub fn classify_send(config: &Config, meta: SocketMeta, dest: Option<&SocketAddr>) -> Verdict {
    if meta.kind == SockKind::Unknown {
        return Verdict::Direct;
    }
    if meta.family == AddrFamily::Other {
        return Verdict::Direct;
    }
    // No explicit address means the socket is already connected, and the
    // connect hook already ruled on it.
    let Some(dest) = dest else {
        return Verdict::Direct;
    };
    if meta.kind == SockKind::Stream {
        return Verdict::Direct;
    }

    let addr = dest.ip();
    let port = dest.port();

    if matches_localnet(config, addr, port) || is_loopback(addr) {
        return Verdict::Direct;
    }
    if config.allow_leak {
        debug!("send: datagram to {} allowed by allow_leak", dest);
        return Verdict::Direct;
    }
    if config.allow_dns && is_dns_port(port) {
        return Verdict::Direct;
    }
    Verdict::Reject(ProxyboundError::PolicyRejected(format!(
        "datagram send to {} would bypass the chain",
        dest
    )))
}
