//! The chain connection engine: walk the selected hops, handshake each one
//! into relaying toward the next, and finally toward the real destination.

use crate::codec::{perform_handshake, Target, TargetAddr};
use crate::ops::RealOps;
use crate::pool::ProxyPool;
use crate::selector;
use proxybound_common::{ChainType, Config, ProxyHop, ProxyboundError, Result};
use std::io;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use tracing::{debug, info, warn};

/// Where a redirected connection is really going.
///
/// `hostname` is present when the caller connected to a synthetic address;
/// the final hop is then asked for the name, and the placeholder IP never
/// reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub addr: IpAddr,
    pub port: u16,
    pub hostname: Option<String>,
}

impl Destination {
    pub fn numeric(addr: IpAddr, port: u16) -> Self {
        Destination {
            addr,
            port,
            hostname: None,
        }
    }

    pub fn named(hostname: impl Into<String>, placeholder: IpAddr, port: u16) -> Self {
        Destination {
            addr: placeholder,
            port,
            hostname: Some(hostname.into()),
        }
    }

    /// Relay target for the final hop.
    pub fn target(&self) -> Target {
        match &self.hostname {
            Some(name) => Target::domain(name.clone(), self.port),
            None => Target {
                addr: match self.addr {
                    IpAddr::V4(ip) => TargetAddr::V4(ip),
                    IpAddr::V6(ip) => TargetAddr::V6(ip),
                },
                port: self.port,
            },
        }
    }

    pub fn describe(&self) -> String {
        match &self.hostname {
            Some(name) => format!("{}:{}", name, self.port),
            None => format!("{}:{}", self.addr, self.port),
        }
    }
}

fn hop_addr(hop: &ProxyHop) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(hop.addr, hop.port))
}

/// Read timeouts from the scripted or real socket surface as `TimedOut` or
/// `WouldBlock`; both mean the hop went silent.
fn normalize(err: ProxyboundError) -> ProxyboundError {
    match err {
        ProxyboundError::IoError(e)
            if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
        {
            ProxyboundError::Timeout
        }
        other => other,
    }
}

fn normalize_io(err: io::Error) -> ProxyboundError {
    normalize(ProxyboundError::IoError(err))
}

/// Whether a failed attempt indicts the hop. Anything else is a property of
/// the destination itself, and retrying through another hop cannot help.
fn blames_hop(err: &ProxyboundError) -> bool {
    matches!(
        err,
        ProxyboundError::IoError(_) | ProxyboundError::Timeout | ProxyboundError::HopRejected(_)
    )
}

/// Connect `sock` to `dest` through the configured chain.
///
/// On success the socket carries an opaque tunnel to the destination and is
/// handed back to the caller untouched. Strict and random chains abort on
/// the first failure; dynamic chains block the failing hop and reselect
/// until no live hop remains.
pub fn connect_through_chain<O: RealOps>(
    ops: &O,
    sock: &mut O::Socket,
    dest: &Destination,
    pool: &ProxyPool,
    config: &Config,
) -> Result<()> {
    if pool.is_empty() {
        return Err(ProxyboundError::ChainExhausted);
    }
    let n = config.chain_len.max(1);

    match config.chain_type {
        ChainType::Strict | ChainType::Random => {
            let picks = selector::select(pool, config.chain_type, n)?;
            attempt(ops, sock, dest, pool, config, &picks).map_err(|(_, e)| e)
        }
        ChainType::Dynamic => {
            // Every failed attempt blocks at least one hop, so the retry
            // count is bounded by the pool size.
            for _ in 0..=pool.len() {
                let picks = selector::select(pool, ChainType::Dynamic, n)?;
                if picks.is_empty() {
                    return Err(ProxyboundError::ChainExhausted);
                }
                match attempt(ops, sock, dest, pool, config, &picks) {
                    Ok(()) => return Ok(()),
                    Err((failed, err)) => {
                        if !blames_hop(&err) {
                            return Err(err);
                        }
                        pool.mark_blocked(failed);
                        debug!(
                            "dynamic chain attempt failed at hop {}: {}, reselecting",
                            failed, err
                        );
                    }
                }
            }
            Err(ProxyboundError::ChainExhausted)
        }
    }
}

/// One pass over a fixed hop order. Failure carries the pool index of the
/// hop held responsible, so dynamic mode knows what to block.
fn attempt<O: RealOps>(
    ops: &O,
    sock: &mut O::Socket,
    dest: &Destination,
    pool: &ProxyPool,
    config: &Config,
    picks: &[usize],
) -> std::result::Result<(), (usize, ProxyboundError)> {
    let first = picks[0];
    let first_hop = pool.hop(first);
    debug!("dialing first hop {}:{}", first_hop.addr, first_hop.port);

    ops.connect(sock, &hop_addr(first_hop), config.connect_timeout())
        .map_err(|e| (first, normalize_io(e)))?;
    ops.set_read_timeout(sock, Some(config.read_timeout()))
        .map_err(|e| (first, normalize_io(e)))?;

    // Ask each hop to relay to the next hop's address, not the destination.
    for window in picks.windows(2) {
        let (current, next) = (window[0], window[1]);
        let next_hop = pool.hop(next);
        let relay = Target::v4(next_hop.addr, next_hop.port);
        debug!(
            "extending chain: hop {} relaying to {}:{}",
            current, next_hop.addr, next_hop.port
        );
        // The unreachable endpoint of a failed relay is the next hop.
        perform_handshake(sock, pool.hop(current), &relay)
            .map_err(|e| (next, normalize(e)))?;
    }

    let last = *picks.last().expect("selection is never empty here");
    perform_handshake(sock, pool.hop(last), &dest.target()).map_err(|e| {
        let e = normalize(e);
        warn!("final hop refused relay to {}: {}", dest.describe(), e);
        (last, e)
    })?;

    info!(
        "chain of {} hop(s) established to {}",
        picks.len(),
        dest.describe()
    );
    Ok(())
}
