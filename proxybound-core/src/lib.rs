//! Proxy-chain connection engine, traffic admission policy and remote-DNS
//! indirection.
//!
//! The host's interposition layer feeds every outbound socket operation
//! through [`hooks::Proxybound`]; the admission policy decides whether it
//! passes through, is refused, or is tunneled through the configured chain
//! of SOCKS4/SOCKS5/HTTP proxies by the chain engine.

pub mod chain;
pub mod codec;
pub mod hooks;
pub mod logging;
pub mod ops;
pub mod policy;
pub mod pool;
pub mod resolver;
pub mod selector;

#[cfg(test)]
pub(crate) mod testutil;

pub use chain::{connect_through_chain, Destination};
pub use hooks::{global_config, init_config, Proxybound};
pub use ops::RealOps;
pub use policy::{classify, classify_bind, classify_send, AddrFamily, SockKind, SocketMeta, Verdict};
pub use pool::ProxyPool;
pub use proxybound_common::{Config, HookOp, ProxyboundError, Result};
