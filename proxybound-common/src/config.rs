use crate::error::{ProxyboundError, Result};
use crate::types::{ChainType, Config, ProxyHop, ProxyKind, MAX_CHAIN, MAX_LOCALNET};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variables honored in addition to the config file.
pub const ENV_CONF_FILE: &str = "PROXYBOUND_CONF_FILE";
pub const ENV_ALLOW_LEAKS: &str = "PROXYBOUND_ALLOW_LEAKS";
pub const ENV_ALLOW_DNS: &str = "PROXYBOUND_ALLOW_DNS";
pub const ENV_QUIET_MODE: &str = "PROXYBOUND_QUIET_MODE";
pub const ENV_SOCKS5_HOST: &str = "PROXYBOUND_SOCKS5_HOST";
pub const ENV_SOCKS5_PORT: &str = "PROXYBOUND_SOCKS5_PORT";
pub const ENV_FORCE_DNS: &str = "PROXYBOUND_FORCE_DNS";

/// Configuration file search paths in order of precedence
pub fn get_config_search_paths(executable_path: &Path, config_arg: Option<&str>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Explicit override (argument, then environment)
    if let Some(config_path) = config_arg {
        paths.push(PathBuf::from(config_path));
    }
    if let Ok(env_path) = std::env::var(ENV_CONF_FILE) {
        paths.push(PathBuf::from(env_path));
    }

    // 2. Executable directory
    if let Some(parent) = executable_path.parent() {
        paths.push(parent.join("proxybound.conf"));
    }

    // 3. XDG_CONFIG_HOME or ~/.config
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg_config).join("proxybound/proxybound.conf"));
    } else if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".config/proxybound/proxybound.conf"));
    }

    // 4. System-wide config
    paths.push(PathBuf::from("/etc/proxybound/proxybound.conf"));

    paths
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

/// Apply the `PROXYBOUND_*` switches on top of whatever the file provided.
fn apply_env_overrides(config: &mut Config) {
    if env_flag(ENV_ALLOW_LEAKS) {
        config.allow_leak = true;
    }
    if env_flag(ENV_ALLOW_DNS) {
        config.allow_dns = true;
    }
    if env_flag(ENV_QUIET_MODE) {
        config.quiet_mode = true;
    }
    if env_flag(ENV_FORCE_DNS) {
        config.proxy_dns = true;
    }
}

/// Build a one-hop SOCKS5 configuration from the shortcut environment
/// variables alone, used when no config file is present.
fn manual_socks5_env() -> Option<Config> {
    let port: u16 = std::env::var(ENV_SOCKS5_PORT).ok()?.parse().ok()?;
    let host = std::env::var(ENV_SOCKS5_HOST).unwrap_or_else(|_| "127.0.0.1".to_string());
    let addr: Ipv4Addr = host.parse().ok()?;

    let mut config = Config {
        proxies: vec![ProxyHop {
            addr,
            port,
            kind: ProxyKind::Socks5,
            username: None,
            password: None,
        }],
        chain_len: 1,
        ..Config::default()
    };
    apply_env_overrides(&mut config);
    debug!("using single SOCKS5 proxy {}:{} from environment", addr, port);
    Some(config)
}

/// Validate a parsed configuration and drop unusable proxy entries.
///
/// Oversized pools and local-net lists are fatal; a hop with a zero address
/// or port is merely dropped, it never enters the pool.
pub fn validate_config(mut config: Config) -> Result<Config> {
    if config.proxies.len() > MAX_CHAIN {
        return Err(ProxyboundError::ConfigError(format!(
            "proxy list has {} entries, maximum is {}",
            config.proxies.len(),
            MAX_CHAIN
        )));
    }
    if config.localnet.len() > MAX_LOCALNET {
        return Err(ProxyboundError::ConfigError(format!(
            "localnet list has {} entries, maximum is {}",
            config.localnet.len(),
            MAX_LOCALNET
        )));
    }

    config.proxies.retain(|hop| {
        if hop.is_valid() {
            true
        } else {
            warn!("dropping proxy entry with zero address or port: {:?}", hop);
            false
        }
    });

    if config.chain_len == 0 {
        config.chain_len = 1;
    }
    if config.chain_type == ChainType::Random && config.chain_len > config.proxies.len() {
        return Err(ProxyboundError::ConfigError(format!(
            "random chain length {} exceeds pool size {}",
            config.chain_len,
            config.proxies.len()
        )));
    }

    Ok(config)
}

/// Load configuration from file, falling back to the environment shortcut
/// and finally to defaults.
pub fn load_config(executable_path: &Path, config_arg: Option<&str>) -> Result<Config> {
    let search_paths = get_config_search_paths(executable_path, config_arg);

    for path in search_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content).map_err(|e| {
                ProxyboundError::ConfigError(format!(
                    "failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            apply_env_overrides(&mut config);
            return validate_config(config);
        }
    }

    if let Some(config) = manual_socks5_env() {
        return validate_config(config);
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}
