use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Hard cap on the proxy pool size.
pub const MAX_CHAIN: usize = 512;
/// Hard cap on the local-network exclusion list.
pub const MAX_LOCALNET: usize = 64;

/// Default high octet of the synthetic remote-DNS subnet (224.0.0.0/8).
pub const DEFAULT_REMOTE_DNS_SUBNET: u8 = 224;

/// Protocol spoken to a single proxy hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Socks4,
    Socks5,
}

/// Runtime health of a hop, mutated only by the chain engine.
///
/// `Busy` and `Dummy` are reserved for future concurrency control and are
/// never set by the current engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HopState {
    #[default]
    Play,
    Blocked,
    Busy,
    Dummy,
}

/// One proxy server in the configured pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyHop {
    pub addr: Ipv4Addr,
    pub port: u16,
    pub kind: ProxyKind,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyHop {
    /// Hops with a zero address or port are configuration noise and are
    /// dropped before they ever enter the pool.
    pub fn is_valid(&self) -> bool {
        !self.addr.is_unspecified() && self.port != 0
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Chain selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Strict,
    #[default]
    Dynamic,
    Random,
}

/// One excluded local network: destinations matching
/// `(dest & netmask) == (network & netmask)` (and the port, when given)
/// bypass the chain entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocalNet {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(default)]
    pub port: Option<u16>,
}

impl LocalNet {
    pub fn contains(&self, addr: Ipv4Addr, port: u16) -> bool {
        let mask = u32::from(self.netmask);
        if (u32::from(addr) & mask) != (u32::from(self.network) & mask) {
            return false;
        }
        match self.port {
            None | Some(0) => true,
            Some(p) => p == port,
        }
    }
}

/// Parsed process-wide configuration, immutable after initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxies: Vec<ProxyHop>,
    #[serde(default)]
    pub chain_type: ChainType,
    #[serde(default = "default_chain_len")]
    pub chain_len: usize,
    /// Milliseconds allowed for one hop's TCP connect.
    #[serde(default = "default_connect_timeout_ms")]
    pub tcp_connect_time_out: u64,
    /// Milliseconds allowed for one handshake read.
    #[serde(default = "default_read_timeout_ms")]
    pub tcp_read_time_out: u64,
    #[serde(default)]
    pub localnet: Vec<LocalNet>,
    #[serde(default = "default_remote_dns_subnet")]
    pub remote_dns_subnet: u8,
    #[serde(default)]
    pub allow_leak: bool,
    #[serde(default)]
    pub allow_dns: bool,
    /// When set, name resolution returns synthetic addresses instead of
    /// resolving locally.
    #[serde(default = "default_true")]
    pub proxy_dns: bool,
    #[serde(default)]
    pub quiet_mode: bool,
}

fn default_chain_len() -> usize {
    1
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_read_timeout_ms() -> u64 {
    4_000
}

fn default_remote_dns_subnet() -> u8 {
    DEFAULT_REMOTE_DNS_SUBNET
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            proxies: Vec::new(),
            chain_type: ChainType::Dynamic,
            chain_len: 1,
            tcp_connect_time_out: default_connect_timeout_ms(),
            tcp_read_time_out: default_read_timeout_ms(),
            localnet: Vec::new(),
            remote_dns_subnet: DEFAULT_REMOTE_DNS_SUBNET,
            allow_leak: false,
            allow_dns: false,
            proxy_dns: true,
            quiet_mode: false,
        }
    }
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_connect_time_out)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_read_time_out)
    }

    /// True when `addr` lies in the synthetic remote-DNS subnet.
    pub fn is_synthetic(&self, addr: Ipv4Addr) -> bool {
        addr.octets()[0] == self.remote_dns_subnet
    }
}

/// Well-known name-service ports eligible for direct pass-through when
/// `allow_dns` is set (plain DNS and DNS-over-TLS).
pub fn is_dns_port(port: u16) -> bool {
    port == 53 || port == 853
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localnet_match_respects_mask_and_port() {
        let net = LocalNet {
            network: Ipv4Addr::new(192, 168, 0, 0),
            netmask: Ipv4Addr::new(255, 255, 0, 0),
            port: None,
        };
        assert!(net.contains(Ipv4Addr::new(192, 168, 42, 7), 80));
        assert!(!net.contains(Ipv4Addr::new(10, 0, 0, 1), 80));

        let with_port = LocalNet {
            port: Some(22),
            ..net
        };
        assert!(with_port.contains(Ipv4Addr::new(192, 168, 1, 1), 22));
        assert!(!with_port.contains(Ipv4Addr::new(192, 168, 1, 1), 80));
    }

    #[test]
    fn invalid_hops_are_detected() {
        let hop = ProxyHop {
            addr: Ipv4Addr::UNSPECIFIED,
            port: 1080,
            kind: ProxyKind::Socks5,
            username: None,
            password: None,
        };
        assert!(!hop.is_valid());

        let hop = ProxyHop {
            addr: Ipv4Addr::new(10, 0, 0, 1),
            port: 0,
            ..hop
        };
        assert!(!hop.is_valid());
    }

    #[test]
    fn synthetic_subnet_check_uses_high_octet() {
        let config = Config::default();
        assert!(config.is_synthetic(Ipv4Addr::new(224, 0, 0, 1)));
        assert!(!config.is_synthetic(Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn dns_ports() {
        assert!(is_dns_port(53));
        assert!(is_dns_port(853));
        assert!(!is_dns_port(443));
    }
}
