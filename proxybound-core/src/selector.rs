//! Chain selection: which hops, in which order, for one connection attempt.

use crate::pool::ProxyPool;
use proxybound_common::{ChainType, ProxyboundError, Result};
use rand::seq::index::sample;
use tracing::debug;

/// Produce the hop order for one attempt, as indices into `pool`.
///
/// - `Strict`: the configured prefix, capped at the pool size. Health is
///   ignored; a dead hop will fail the attempt.
/// - `Dynamic`: the configured order with blocked hops skipped, stopping at
///   `n` or pool exhaustion. Fewer than `n` is allowed; the engine insists
///   only on at least one working hop.
/// - `Random`: `n` distinct hops drawn uniformly, draw order is hop order.
///   Health is deliberately ignored, and `n` larger than the pool is an
///   error since sampling is without replacement.
pub fn select(pool: &ProxyPool, chain_type: ChainType, n: usize) -> Result<Vec<usize>> {
    let picks = match chain_type {
        ChainType::Strict => (0..pool.len()).take(n).collect(),
        ChainType::Dynamic => {
            let picks: Vec<usize> = pool.live_indices().into_iter().take(n).collect();
            if picks.len() < n {
                debug!(
                    "dynamic chain degraded: {} live hops available, {} requested",
                    picks.len(),
                    n
                );
            }
            picks
        }
        ChainType::Random => {
            if n > pool.len() {
                return Err(ProxyboundError::ConfigError(format!(
                    "random chain length {} exceeds pool size {}",
                    n,
                    pool.len()
                )));
            }
            sample(&mut rand::thread_rng(), pool.len(), n).into_vec()
        }
    };
    Ok(picks)
}
