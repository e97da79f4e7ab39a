use thiserror::Error;

/// Common error types used across proxybound components
#[derive(Error, Debug)]
pub enum ProxyboundError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("handshake timed out")]
    Timeout,

    #[error("proxy hop rejected the request: {0}")]
    HopRejected(String),

    #[error("no usable proxy hop left in the pool")]
    ChainExhausted,

    #[error("destination not expressible for this proxy type: {0}")]
    InvalidDestination(String),

    #[error("admission policy rejected the operation: {0}")]
    PolicyRejected(String),

    #[error("real socket primitive unavailable: {0}")]
    UpstreamUnresolved(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("address parse error: {0}")]
    AddrParseError(#[from] std::net::AddrParseError),
}

/// Which hooked operation failed; errno follows the call, not the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Connect,
    Bind,
    Send,
}

impl ProxyboundError {
    /// POSIX errno the interposition layer sets when `op` fails with this
    /// error: a failed or rejected connect is a refusal, a rejected bind
    /// or send-family call faults, matching the errno contract of the
    /// hooked calls.
    pub fn errno(&self, op: HookOp) -> i32 {
        match op {
            HookOp::Connect => libc::ECONNREFUSED,
            HookOp::Bind | HookOp::Send => libc::EFAULT,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyboundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_follows_the_operation() {
        let leak = ProxyboundError::PolicyRejected("udp".into());
        assert_eq!(leak.errno(HookOp::Connect), libc::ECONNREFUSED);
        assert_eq!(leak.errno(HookOp::Send), libc::EFAULT);
        assert_eq!(
            ProxyboundError::ChainExhausted.errno(HookOp::Connect),
            libc::ECONNREFUSED
        );
        assert_eq!(
            ProxyboundError::Timeout.errno(HookOp::Bind),
            libc::EFAULT
        );
    }
}
