use lazy_static::lazy_static;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use tracing::debug;

use crate::types::DEFAULT_REMOTE_DNS_SUBNET;

/// Table of synthetic addresses handed out in place of real DNS answers.
///
/// Each allocated address lives in `<subnet>.0.0.0/8` (default 224/8); the
/// low 24 bits are a monotonically growing counter. The recorded hostname is
/// recovered when a connection to the synthetic address arrives, so the
/// final proxy hop can be asked for the name instead of the placeholder IP.
///
/// Entries are never evicted. When all 2^24 - 2 slots are taken, allocation
/// fails rather than silently reusing an address another connection may
/// still depend on.
#[derive(Debug)]
pub struct SyntheticAddrTable {
    subnet: u8,
    next_index: u32,
    addr_to_host: HashMap<Ipv4Addr, String>,
    host_to_addr: HashMap<String, Ipv4Addr>,
}

/// Low 24 bits available for allocation (skip .0.0.0 and .255.255.255).
const INDEX_START: u32 = 1;
const INDEX_END: u32 = 0x00FF_FFFE;

impl SyntheticAddrTable {
    pub fn new(subnet: u8) -> Self {
        Self {
            subnet,
            next_index: INDEX_START,
            addr_to_host: HashMap::new(),
            host_to_addr: HashMap::new(),
        }
    }

    pub fn subnet(&self) -> u8 {
        self.subnet
    }

    /// Allocate (or re-use) a synthetic address for `hostname`.
    ///
    /// Repeated lookups of the same hostname return the same address, so a
    /// process hammering one name cannot exhaust the table.
    pub fn allocate(&mut self, hostname: &str) -> Result<Ipv4Addr, String> {
        if let Some(existing) = self.host_to_addr.get(hostname) {
            return Ok(*existing);
        }
        if self.next_index > INDEX_END {
            return Err("synthetic address space exhausted".to_string());
        }

        let index = self.next_index;
        self.next_index += 1;

        let addr = Ipv4Addr::from((u32::from(self.subnet) << 24) | index);
        self.addr_to_host.insert(addr, hostname.to_string());
        self.host_to_addr.insert(hostname.to_string(), addr);
        debug!("allocated synthetic address {} for {}", addr, hostname);
        Ok(addr)
    }

    /// Recover the hostname a synthetic address stands for.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&str> {
        self.addr_to_host.get(&addr).map(|s| s.as_str())
    }

    /// True when `addr` has this table's high octet, whether or not it was
    /// ever allocated.
    pub fn in_subnet(&self, addr: Ipv4Addr) -> bool {
        addr.octets()[0] == self.subnet
    }

    pub fn len(&self) -> usize {
        self.addr_to_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addr_to_host.is_empty()
    }
}

lazy_static! {
    /// Process-wide table shared by the resolver hooks (writers) and the
    /// connection engine (readers).
    pub static ref SYNTHETIC_TABLE: Mutex<SyntheticAddrTable> =
        Mutex::new(SyntheticAddrTable::new(DEFAULT_REMOTE_DNS_SUBNET));
}

/// Point the global table at the configured subnet. Only honored while the
/// table is empty; once addresses are out, the subnet cannot move.
pub fn set_synthetic_subnet(subnet: u8) {
    let mut table = SYNTHETIC_TABLE.lock().expect("synthetic table poisoned");
    if table.is_empty() {
        *table = SyntheticAddrTable::new(subnet);
    }
}

pub fn allocate_synthetic(hostname: &str) -> Result<Ipv4Addr, String> {
    SYNTHETIC_TABLE
        .lock()
        .map_err(|e| format!("failed to lock synthetic table: {}", e))?
        .allocate(hostname)
}

pub fn lookup_synthetic(addr: Ipv4Addr) -> Option<String> {
    SYNTHETIC_TABLE
        .lock()
        .ok()?
        .lookup(addr)
        .map(|s| s.to_string())
}
