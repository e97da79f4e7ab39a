//! Remote-name-resolution indirection.
//!
//! Instead of resolving locally (and leaking the query), a lookup hands the
//! application a synthetic address and records the hostname. When the
//! application connects to that address, the admission policy recovers the
//! name and the final hop resolves it on the far side of the chain.

use proxybound_common::{allocate_synthetic, Config, ProxyboundError, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::debug;

/// Forward lookup. Numeric literals and localhost short-circuit; everything
/// else gets a synthetic address from the shared table.
pub fn resolve(config: &Config, hostname: &str) -> Result<Ipv4Addr> {
    if hostname.is_empty() {
        return Err(ProxyboundError::InvalidDestination(
            "empty hostname".to_string(),
        ));
    }
    if let Ok(literal) = hostname.parse::<Ipv4Addr>() {
        return Ok(literal);
    }
    if hostname == "localhost" {
        return Ok(Ipv4Addr::LOCALHOST);
    }

    let addr = allocate_synthetic(hostname).map_err(ProxyboundError::InvalidDestination)?;
    // A placeholder outside the configured subnet would sail past the
    // admission policy and leak; refuse to hand one out.
    if addr.octets()[0] != config.remote_dns_subnet {
        return Err(ProxyboundError::ConfigError(format!(
            "synthetic table subnet {} does not match configured subnet {}",
            addr.octets()[0],
            config.remote_dns_subnet
        )));
    }
    debug!("resolved {} to synthetic {}", hostname, addr);
    Ok(addr)
}

/// Forward lookup with a service, the `getaddrinfo` shape. Only numeric
/// services are interpreted; named services belong to the real resolver.
pub fn resolve_with_service(
    config: &Config,
    node: &str,
    service: Option<&str>,
) -> Result<Vec<SocketAddr>> {
    let port: u16 = match service {
        Some(s) => s.parse().map_err(|_| {
            ProxyboundError::InvalidDestination(format!("unsupported service name {:?}", s))
        })?,
        None => 0,
    };
    let addr = resolve(config, node)?;
    Ok(vec![SocketAddr::new(IpAddr::V4(addr), port)])
}

/// The `getnameinfo` shape: purely presentational, no reverse lookup ever
/// happens. The "name" is the dotted quad, the service is the port number.
pub fn name_info(addr: &SocketAddr) -> (String, String) {
    (addr.ip().to_string(), addr.port().to_string())
}

/// The `gethostbyaddr` shape: render 4 raw address bytes as a dotted quad.
pub fn host_by_addr(addr: &[u8]) -> Result<String> {
    let octets: [u8; 4] = addr.try_into().map_err(|_| {
        ProxyboundError::InvalidDestination(format!(
            "reverse lookup needs 4 address bytes, got {}",
            addr.len()
        ))
    })?;
    Ok(Ipv4Addr::from(octets).to_string())
}
