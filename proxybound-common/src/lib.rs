pub mod config;
pub mod error;
pub mod synthetic;
pub mod types;

pub use config::{load_config, validate_config, get_config_search_paths};
pub use error::{HookOp, ProxyboundError, Result};
pub use synthetic::{allocate_synthetic, lookup_synthetic, set_synthetic_subnet, SyntheticAddrTable};
pub use types::{
    ChainType, Config, HopState, LocalNet, ProxyHop, ProxyKind, is_dns_port, MAX_CHAIN,
    MAX_LOCALNET,
};
