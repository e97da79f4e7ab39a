//! Host-facing facade: the connect/bind/send/resolve equivalents the
//! interposition layer calls instead of the real primitives.
//!
//! Every per-operation failure comes back as an error carrying the errno to
//! set; nothing here panics on a bad peer or a dead proxy.

use crate::chain;
use crate::ops::RealOps;
use crate::policy::{self, SocketMeta, Verdict};
use crate::pool::ProxyPool;
use crate::resolver;
use proxybound_common::{
    set_synthetic_subnet, validate_config, Config, HookOp, ProxyboundError, Result,
};
use std::io::IoSlice;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Validate and install the process-wide configuration.
///
/// Safe under concurrent first use: exactly one caller wins, later calls
/// get the already-installed value. A malformed configuration is fatal to
/// the caller; there is no degraded mode.
pub fn init_config(config: Config) -> Result<&'static Config> {
    let config = validate_config(config)?;
    let installed = GLOBAL_CONFIG.get_or_init(|| config);
    set_synthetic_subnet(installed.remote_dns_subnet);
    info!(
        "proxybound initialized: {} hop(s), {:?} chain of length {}",
        installed.proxies.len(),
        installed.chain_type,
        installed.chain_len
    );
    Ok(installed)
}

pub fn global_config() -> Option<&'static Config> {
    GLOBAL_CONFIG.get()
}

/// The hook surface, generic over the injected real primitives.
pub struct Proxybound<O: RealOps> {
    config: Config,
    pool: ProxyPool,
    ops: O,
}

impl<O: RealOps> Proxybound<O> {
    pub fn new(config: Config, ops: O) -> Result<Self> {
        let config = validate_config(config)?;
        set_synthetic_subnet(config.remote_dns_subnet);
        let pool = ProxyPool::new(config.proxies.clone());
        Ok(Self { config, pool, ops })
    }

    /// Build against the globally installed configuration.
    pub fn from_global(ops: O) -> Result<Self> {
        let config = global_config().ok_or_else(|| {
            ProxyboundError::ConfigError("proxybound configuration not initialized".to_string())
        })?;
        Self::new(config.clone(), ops)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// `connect`-equivalent.
    pub fn connect(
        &self,
        sock: &mut O::Socket,
        meta: SocketMeta,
        dest: &SocketAddr,
    ) -> Result<()> {
        match policy::classify(&self.config, meta, dest) {
            Verdict::Direct => {
                debug!("connect: {} passes through", dest);
                self.ops
                    .connect(sock, dest, self.config.connect_timeout())
                    .map_err(Into::into)
            }
            Verdict::Redirect(destination) => {
                debug!("connect: redirecting to {}", destination.describe());
                chain::connect_through_chain(
                    &self.ops,
                    sock,
                    &destination,
                    &self.pool,
                    &self.config,
                )
                .map_err(|e| {
                    warn!("chain to {} failed: {}", destination.describe(), e);
                    e
                })
            }
            Verdict::Reject(err) => {
                info!("connect to {} rejected: {}", dest, err);
                Err(err)
            }
        }
    }

    /// `bind`-equivalent. Never proxied.
    pub fn bind(&self, sock: &mut O::Socket, meta: SocketMeta, local: &SocketAddr) -> Result<()> {
        match policy::classify_bind(&self.config, meta, local) {
            Verdict::Direct => self.ops.bind(sock, local).map_err(Into::into),
            Verdict::Redirect(_) => unreachable!("bind policy never redirects"),
            Verdict::Reject(err) => {
                info!("bind to {} rejected: {}", local, err);
                Err(err)
            }
        }
    }

    /// `send`-equivalent (connected socket, no explicit address).
    pub fn send(&self, sock: &mut O::Socket, meta: SocketMeta, buf: &[u8]) -> Result<usize> {
        match policy::classify_send(&self.config, meta, None) {
            Verdict::Direct => self.ops.send(sock, buf).map_err(Into::into),
            Verdict::Redirect(_) => unreachable!("send policy never redirects"),
            Verdict::Reject(err) => Err(err),
        }
    }

    /// `sendto`-equivalent.
    pub fn sendto(
        &self,
        sock: &mut O::Socket,
        meta: SocketMeta,
        buf: &[u8],
        dest: Option<&SocketAddr>,
    ) -> Result<usize> {
        match policy::classify_send(&self.config, meta, dest) {
            Verdict::Direct => self.ops.sendto(sock, buf, dest).map_err(Into::into),
            Verdict::Redirect(_) => unreachable!("send policy never redirects"),
            Verdict::Reject(err) => {
                info!("sendto {:?} rejected: {}", dest, err);
                Err(err)
            }
        }
    }

    /// `sendmsg`-equivalent.
    pub fn sendmsg(
        &self,
        sock: &mut O::Socket,
        meta: SocketMeta,
        bufs: &[IoSlice<'_>],
        dest: Option<&SocketAddr>,
    ) -> Result<usize> {
        match policy::classify_send(&self.config, meta, dest) {
            Verdict::Direct => self.ops.sendmsg(sock, bufs, dest).map_err(Into::into),
            Verdict::Redirect(_) => unreachable!("send policy never redirects"),
            Verdict::Reject(err) => {
                info!("sendmsg to {:?} rejected: {}", dest, err);
                Err(err)
            }
        }
    }

    /// `gethostbyname`-equivalent.
    pub fn resolve_host(&self, hostname: &str) -> Result<IpAddr> {
        if self.config.proxy_dns {
            resolver::resolve(&self.config, hostname).map(IpAddr::V4)
        } else {
            let addrs = self.ops.getaddrinfo(hostname, None)?;
            addrs.first().map(|a| a.ip()).ok_or_else(|| {
                ProxyboundError::UpstreamUnresolved(format!("no address for {}", hostname))
            })
        }
    }

    /// `getaddrinfo`-equivalent.
    pub fn resolve_service(&self, node: &str, service: Option<&str>) -> Result<Vec<SocketAddr>> {
        if self.config.proxy_dns {
            resolver::resolve_with_service(&self.config, node, service)
        } else {
            self.ops.getaddrinfo(node, service).map_err(Into::into)
        }
    }

    /// `getnameinfo`-equivalent: presentation only when the resolver is on.
    pub fn name_info(&self, addr: &SocketAddr) -> Result<(String, String)> {
        if self.config.proxy_dns {
            Ok(resolver::name_info(addr))
        } else {
            self.ops.getnameinfo(addr).map_err(Into::into)
        }
    }

    /// `gethostbyaddr`-equivalent.
    pub fn host_by_addr(&self, addr: &[u8]) -> Result<String> {
        resolver::host_by_addr(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedStream;
    use proxybound_common::{ChainType, ProxyHop, ProxyKind};
    use std::cell::RefCell;
    use std::io;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// Mock real primitives that log what was passed through unproxied.
    struct RecordingOps {
        direct_connects: RefCell<Vec<SocketAddr>>,
        sent: RefCell<Vec<Vec<u8>>>,
        proxy_script: Vec<u8>,
    }

    impl RecordingOps {
        fn new() -> Self {
            Self {
                direct_connects: RefCell::new(Vec::new()),
                sent: RefCell::new(Vec::new()),
                proxy_script: Vec::new(),
            }
        }

        fn with_script(script: Vec<u8>) -> Self {
            Self {
                proxy_script: script,
                ..Self::new()
            }
        }
    }

    impl RealOps for RecordingOps {
        type Socket = ScriptedStream;

        fn connect(
            &self,
            sock: &mut Self::Socket,
            addr: &SocketAddr,
            _timeout: Duration,
        ) -> io::Result<()> {
            self.direct_connects.borrow_mut().push(*addr);
            sock.load(self.proxy_script.clone());
            Ok(())
        }

        fn set_read_timeout(
            &self,
            _sock: &mut Self::Socket,
            _timeout: Option<Duration>,
        ) -> io::Result<()> {
            Ok(())
        }

        fn bind(&self, _sock: &mut Self::Socket, _addr: &SocketAddr) -> io::Result<()> {
            Ok(())
        }

        fn send(&self, _sock: &mut Self::Socket, buf: &[u8]) -> io::Result<usize> {
            self.sent.borrow_mut().push(buf.to_vec());
            Ok(buf.len())
        }

        fn sendto(
            &self,
            _sock: &mut Self::Socket,
            buf: &[u8],
            _addr: Option<&SocketAddr>,
        ) -> io::Result<usize> {
            self.sent.borrow_mut().push(buf.to_vec());
            Ok(buf.len())
        }

        fn sendmsg(
            &self,
            _sock: &mut Self::Socket,
            bufs: &[IoSlice<'_>],
            _addr: Option<&SocketAddr>,
        ) -> io::Result<usize> {
            Ok(bufs.iter().map(|b| b.len()).sum())
        }

        fn getaddrinfo(&self, _node: &str, _service: Option<&str>) -> io::Result<Vec<SocketAddr>> {
            Ok(vec!["1.2.3.4:0".parse().unwrap()])
        }

        fn getnameinfo(&self, _addr: &SocketAddr) -> io::Result<(String, String)> {
            Ok(("real.example".to_string(), "http".to_string()))
        }
    }

    fn one_hop_config() -> Config {
        Config {
            proxies: vec![ProxyHop {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                port: 1080,
                kind: ProxyKind::Socks4,
                username: None,
                password: None,
            }],
            chain_type: ChainType::Strict,
            chain_len: 1,
            ..Config::default()
        }
    }

    fn sa(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn loopback_connect_goes_direct() {
        let pb = Proxybound::new(one_hop_config(), RecordingOps::new()).unwrap();
        let mut sock = ScriptedStream::new(Vec::new());
        pb.connect(&mut sock, SocketMeta::stream_inet(), &sa("127.0.0.1:8080"))
            .unwrap();
        assert_eq!(
            pb.ops.direct_connects.borrow().as_slice(),
            &[sa("127.0.0.1:8080")]
        );
        // No handshake bytes were written.
        assert!(sock.written().is_empty());
    }

    #[test]
    fn stream_connect_runs_the_chain() {
        let granted = vec![0, 0x5A, 0, 0, 0, 0, 0, 0];
        let pb =
            Proxybound::new(one_hop_config(), RecordingOps::with_script(granted)).unwrap();
        let mut sock = ScriptedStream::new(Vec::new());
        pb.connect(&mut sock, SocketMeta::stream_inet(), &sa("93.184.216.34:80"))
            .unwrap();
        // The socket was connected to the hop, not the destination.
        assert_eq!(
            pb.ops.direct_connects.borrow().as_slice(),
            &[sa("10.0.0.1:1080")]
        );
        // And a SOCKS4 request for the destination went out.
        assert_eq!(&sock.written()[4..8], &[93, 184, 216, 34]);
    }

    #[test]
    fn failed_chain_surfaces_refusal_errno() {
        let rejected = vec![0, 0x5B, 0, 0, 0, 0, 0, 0];
        let pb =
            Proxybound::new(one_hop_config(), RecordingOps::with_script(rejected)).unwrap();
        let mut sock = ScriptedStream::new(Vec::new());
        let err = pb
            .connect(&mut sock, SocketMeta::stream_inet(), &sa("93.184.216.34:80"))
            .unwrap_err();
        assert_eq!(err.errno(HookOp::Connect), libc::ECONNREFUSED);
    }

    #[test]
    fn datagram_sendto_gated_by_policy() {
        let pb = Proxybound::new(one_hop_config(), RecordingOps::new()).unwrap();
        let mut sock = ScriptedStream::new(Vec::new());

        let err = pb
            .sendto(
                &mut sock,
                SocketMeta::dgram_inet(),
                b"query",
                Some(&sa("8.8.8.8:123")),
            )
            .unwrap_err();
        assert_eq!(err.errno(HookOp::Send), libc::EFAULT);

        // Loopback datagrams still flow.
        let n = pb
            .sendto(
                &mut sock,
                SocketMeta::dgram_inet(),
                b"query",
                Some(&sa("127.0.0.1:123")),
            )
            .unwrap();
        assert_eq!(n, 5);
    }

    #[test]
    fn bind_to_remote_address_is_rejected() {
        let pb = Proxybound::new(one_hop_config(), RecordingOps::new()).unwrap();
        let mut sock = ScriptedStream::new(Vec::new());
        let err = pb
            .bind(&mut sock, SocketMeta::stream_inet(), &sa("93.184.216.34:80"))
            .unwrap_err();
        assert_eq!(err.errno(HookOp::Bind), libc::EFAULT);

        pb.bind(&mut sock, SocketMeta::stream_inet(), &sa("0.0.0.0:8080"))
            .unwrap();
    }

    #[test]
    fn resolver_on_returns_synthetic_addresses() {
        let pb = Proxybound::new(one_hop_config(), RecordingOps::new()).unwrap();
        let addr = pb.resolve_host("hooks-test.example").unwrap();
        match addr {
            IpAddr::V4(v4) => assert_eq!(v4.octets()[0], 224),
            other => panic!("expected v4 synthetic, got {}", other),
        }
    }

    #[test]
    fn resolver_off_delegates_to_real_ops() {
        let config = Config {
            proxy_dns: false,
            ..one_hop_config()
        };
        let pb = Proxybound::new(config, RecordingOps::new()).unwrap();
        let addr = pb.resolve_host("hooks-test.example").unwrap();
        assert_eq!(addr, "1.2.3.4".parse::<IpAddr>().unwrap());

        let (host, service) = pb.name_info(&sa("1.2.3.4:80")).unwrap();
        assert_eq!(host, "real.example");
        assert_eq!(service, "http");
    }

    #[test]
    fn name_info_with_resolver_is_numeric() {
        let pb = Proxybound::new(one_hop_config(), RecordingOps::new()).unwrap();
        let (host, service) = pb.name_info(&sa("224.0.0.9:443")).unwrap();
        assert_eq!(host, "224.0.0.9");
        assert_eq!(service, "443");
    }

    #[test]
    fn global_config_installs_once() {
        let first = init_config(one_hop_config()).unwrap();
        let second = init_config(Config::default()).unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn resolved_name_survives_to_the_wire() {
        // End to end: resolve, then connect to the synthetic address, and
        // check the hostname (not the placeholder) reaches the proxy.
        let mut script = vec![5, 0];
        script.extend_from_slice(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        let config = Config {
            proxies: vec![ProxyHop {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                port: 1080,
                kind: ProxyKind::Socks5,
                username: None,
                password: None,
            }],
            ..one_hop_config()
        };
        let pb = Proxybound::new(config, RecordingOps::with_script(script)).unwrap();

        let addr = pb.resolve_host("end-to-end.example").unwrap();
        let mut sock = ScriptedStream::new(Vec::new());
        pb.connect(
            &mut sock,
            SocketMeta::stream_inet(),
            &SocketAddr::new(addr, 443),
        )
        .unwrap();

        let written = sock.written();
        let needle = b"end-to-end.example";
        assert!(written.windows(needle.len()).any(|w| w == needle));
    }
}
