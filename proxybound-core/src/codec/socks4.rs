//! SOCKS4 / SOCKS4a relay requests.
//!
//! SOCKS4 carries IPv4 addresses only; hostname targets use the 4a
//! extension (sentinel IP `0.0.0.1`, hostname appended after the user-id).

use crate::codec::{Target, TargetAddr};
use proxybound_common::{ProxyboundError, Result};
use std::io::{Read, Write};
use tracing::debug;

pub const VERSION: u8 = 4;
pub const CMD_CONNECT: u8 = 1;

pub const REPLY_GRANTED: u8 = 0x5A;
pub const REPLY_REJECTED: u8 = 0x5B;
pub const REPLY_NO_IDENTD: u8 = 0x5C;
pub const REPLY_IDENTD_MISMATCH: u8 = 0x5D;

/// SOCKS4a sentinel: an "IP" of 0.0.0.x with x != 0 tells the proxy the
/// real host follows as a string.
const SOCKS4A_SENTINEL: [u8; 4] = [0, 0, 0, 1];

const MAX_HOSTNAME: usize = 255;

/// Encode a CONNECT request for `target`.
pub fn encode_connect(target: &Target, user: Option<&str>) -> Result<Vec<u8>> {
    let user_bytes = user.unwrap_or("").as_bytes();

    let mut request = Vec::with_capacity(16 + user_bytes.len());
    request.push(VERSION);
    request.push(CMD_CONNECT);
    request.extend_from_slice(&target.port.to_be_bytes());

    match &target.addr {
        TargetAddr::V4(ip) => {
            request.extend_from_slice(&ip.octets());
            request.extend_from_slice(user_bytes);
            request.push(0x00);
        }
        TargetAddr::Domain(name) => {
            if name.is_empty() || name.len() > MAX_HOSTNAME {
                return Err(ProxyboundError::InvalidDestination(format!(
                    "hostname length {} not representable in SOCKS4a",
                    name.len()
                )));
            }
            request.extend_from_slice(&SOCKS4A_SENTINEL);
            request.extend_from_slice(user_bytes);
            request.push(0x00);
            request.extend_from_slice(name.as_bytes());
            request.push(0x00);
        }
        TargetAddr::V6(_) => {
            return Err(ProxyboundError::InvalidDestination(
                "SOCKS4 cannot carry an IPv6 target".to_string(),
            ));
        }
    }

    Ok(request)
}

/// Decode the fixed 8-byte reply `[VN, CD, DSTPORT(2), DSTIP(4)]`.
pub fn decode_reply(reply: &[u8; 8]) -> Result<()> {
    match reply[1] {
        REPLY_GRANTED => Ok(()),
        REPLY_REJECTED => Err(ProxyboundError::HopRejected(
            "SOCKS4: request rejected or failed".to_string(),
        )),
        REPLY_NO_IDENTD => Err(ProxyboundError::HopRejected(
            "SOCKS4: rejected, identd unreachable".to_string(),
        )),
        REPLY_IDENTD_MISMATCH => Err(ProxyboundError::HopRejected(
            "SOCKS4: rejected, identd user mismatch".to_string(),
        )),
        code => Err(ProxyboundError::HopRejected(format!(
            "SOCKS4: unknown reply code 0x{:02X}",
            code
        ))),
    }
}

/// Full request/reply exchange on `stream`.
pub fn handshake<S: Read + Write>(stream: &mut S, target: &Target, user: Option<&str>) -> Result<()> {
    let request = encode_connect(target, user)?;
    stream.write_all(&request)?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply)?;
    decode_reply(&reply)?;

    debug!("SOCKS4: relay granted for {}:{}", target.host_string(), target.port);
    Ok(())
}
