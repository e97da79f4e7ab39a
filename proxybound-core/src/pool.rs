//! The configured proxy pool plus its runtime per-hop health.
//!
//! The hop list itself is immutable after construction; only the health
//! states change, from whichever thread happens to run a connection, so
//! they sit behind one coarse mutex.

use proxybound_common::{HopState, ProxyHop};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
pub struct ProxyPool {
    hops: Vec<ProxyHop>,
    states: Mutex<Vec<HopState>>,
}

impl ProxyPool {
    pub fn new(hops: Vec<ProxyHop>) -> Self {
        let states = Mutex::new(vec![HopState::Play; hops.len()]);
        Self { hops, states }
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn hop(&self, index: usize) -> &ProxyHop {
        &self.hops[index]
    }

    pub fn state(&self, index: usize) -> HopState {
        self.states.lock().expect("hop state lock poisoned")[index]
    }

    /// Remember that `index` failed; dynamic selection skips it afterwards.
    pub fn mark_blocked(&self, index: usize) {
        let hop = &self.hops[index];
        warn!("marking proxy hop {}:{} as blocked", hop.addr, hop.port);
        self.states.lock().expect("hop state lock poisoned")[index] = HopState::Blocked;
    }

    /// Indices currently usable by dynamic selection.
    pub fn live_indices(&self) -> Vec<usize> {
        let states = self.states.lock().expect("hop state lock poisoned");
        (0..self.hops.len())
            .filter(|&i| states[i] == HopState::Play)
            .collect()
    }
}
