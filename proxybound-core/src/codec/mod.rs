use proxybound_common::{ProxyHop, ProxyKind, Result};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr};

pub mod http;
pub mod socks4;
pub mod socks5;

/// Address form carried in a relay request to one proxy hop.
///
/// A `Domain` target is what makes remote DNS work: the placeholder address
/// handed to the application never goes on the wire, the hostname does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Domain(String),
}

/// Destination of one relay request: the next hop, or the real endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub addr: TargetAddr,
    pub port: u16,
}

impl Target {
    pub fn v4(addr: Ipv4Addr, port: u16) -> Self {
        Target {
            addr: TargetAddr::V4(addr),
            port,
        }
    }

    pub fn domain(name: impl Into<String>, port: u16) -> Self {
        Target {
            addr: TargetAddr::Domain(name.into()),
            port,
        }
    }

    /// Host part as it appears in an HTTP CONNECT request line.
    pub fn host_string(&self) -> String {
        match &self.addr {
            TargetAddr::V4(ip) => ip.to_string(),
            TargetAddr::V6(ip) => format!("[{}]", ip),
            TargetAddr::Domain(name) => name.clone(),
        }
    }
}

/// Run the handshake `hop` expects, asking it to relay to `target`.
///
/// On success the stream carries an opaque tunnel to `target`; nothing of
/// the proxy protocol remains buffered.
pub fn perform_handshake<S: Read + Write>(
    stream: &mut S,
    hop: &ProxyHop,
    target: &Target,
) -> Result<()> {
    match hop.kind {
        ProxyKind::Socks4 => socks4::handshake(stream, target, hop.username.as_deref()),
        ProxyKind::Socks5 => socks5::handshake(stream, target, hop.credentials()),
        ProxyKind::Http => http::handshake(stream, target, hop.credentials()),
    }
}
