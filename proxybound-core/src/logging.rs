//! Logging is advisory: it never changes what the policy or engine decide.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the host process. `PROXYBOUND_LOG` overrides the
/// default level; quiet mode keeps only errors. Safe to call more than
/// once, later calls are no-ops.
pub fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_env("PROXYBOUND_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
