//! SOCKS5 (RFC 1928) relay requests with optional username/password
//! authentication (RFC 1929).
//!
//! Hostname targets are encoded with the domain-name address type, which is
//! how a destination that was never resolved locally reaches the proxy.

use crate::codec::{Target, TargetAddr};
use proxybound_common::{ProxyboundError, Result};
use std::io::{Read, Write};
use tracing::debug;

pub const VERSION: u8 = 5;
pub const CMD_CONNECT: u8 = 1;

pub const METHOD_NO_AUTH: u8 = 0x00;
pub const METHOD_USERPASS: u8 = 0x02;
pub const METHOD_UNACCEPTABLE: u8 = 0xFF;

pub const ATYP_V4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_V6: u8 = 0x04;

const USERPASS_VERSION: u8 = 0x01;
const MAX_FIELD: usize = 255;

/// Method-selection greeting; offers username/password only when
/// credentials are configured.
pub fn encode_methods(with_userpass: bool) -> Vec<u8> {
    if with_userpass {
        vec![VERSION, 2, METHOD_NO_AUTH, METHOD_USERPASS]
    } else {
        vec![VERSION, 1, METHOD_NO_AUTH]
    }
}

/// Decode the 2-byte method selection, returning the chosen method.
pub fn decode_method_selection(reply: &[u8; 2]) -> Result<u8> {
    if reply[0] != VERSION {
        return Err(ProxyboundError::HopRejected(format!(
            "SOCKS5: bad version 0x{:02X} in method selection",
            reply[0]
        )));
    }
    if reply[1] == METHOD_UNACCEPTABLE {
        return Err(ProxyboundError::HopRejected(
            "SOCKS5: no acceptable authentication method".to_string(),
        ));
    }
    Ok(reply[1])
}

/// RFC 1929 username/password frame.
pub fn encode_userpass(username: &str, password: &str) -> Result<Vec<u8>> {
    if username.len() > MAX_FIELD || password.len() > MAX_FIELD {
        return Err(ProxyboundError::InvalidDestination(
            "SOCKS5: username or password longer than 255 bytes".to_string(),
        ));
    }
    let mut frame = Vec::with_capacity(3 + username.len() + password.len());
    frame.push(USERPASS_VERSION);
    frame.push(username.len() as u8);
    frame.extend_from_slice(username.as_bytes());
    frame.push(password.len() as u8);
    frame.extend_from_slice(password.as_bytes());
    Ok(frame)
}

pub fn decode_userpass_reply(reply: &[u8; 2]) -> Result<()> {
    if reply[0] != USERPASS_VERSION {
        return Err(ProxyboundError::HopRejected(format!(
            "SOCKS5: bad auth sub-negotiation version 0x{:02X}",
            reply[0]
        )));
    }
    if reply[1] != 0x00 {
        return Err(ProxyboundError::HopRejected(
            "SOCKS5: username/password authentication failed".to_string(),
        ));
    }
    Ok(())
}

/// CONNECT request for `target`. Hostnames become ATYP 3, never a
/// placeholder IPv4 value.
pub fn encode_connect(target: &Target) -> Result<Vec<u8>> {
    let mut request = vec![VERSION, CMD_CONNECT, 0x00];

    match &target.addr {
        TargetAddr::V4(ip) => {
            request.push(ATYP_V4);
            request.extend_from_slice(&ip.octets());
        }
        TargetAddr::V6(ip) => {
            request.push(ATYP_V6);
            request.extend_from_slice(&ip.octets());
        }
        TargetAddr::Domain(name) => {
            if name.is_empty() || name.len() > MAX_FIELD {
                return Err(ProxyboundError::InvalidDestination(format!(
                    "hostname length {} not representable in SOCKS5",
                    name.len()
                )));
            }
            request.push(ATYP_DOMAIN);
            request.push(name.len() as u8);
            request.extend_from_slice(name.as_bytes());
        }
    }

    request.extend_from_slice(&target.port.to_be_bytes());
    Ok(request)
}

fn reply_status_message(status: u8) -> &'static str {
    match status {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown SOCKS5 error",
    }
}

/// Decode the fixed reply head `[VER, REP, RSV, ATYP]`.
pub fn decode_reply_head(reply: &[u8; 4]) -> Result<u8> {
    if reply[0] != VERSION {
        return Err(ProxyboundError::HopRejected(format!(
            "SOCKS5: bad version 0x{:02X} in reply",
            reply[0]
        )));
    }
    if reply[1] != 0x00 {
        return Err(ProxyboundError::HopRejected(format!(
            "SOCKS5: connect failed: {}",
            reply_status_message(reply[1])
        )));
    }
    Ok(reply[3])
}

/// Consume the variable-length bound address trailing a success reply, so
/// nothing of the handshake leaks into the tunneled stream.
fn drain_bound_addr<S: Read>(stream: &mut S, atyp: u8) -> Result<()> {
    match atyp {
        ATYP_V4 => {
            let mut rest = [0u8; 6];
            stream.read_exact(&mut rest)?;
        }
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len)?;
            let mut rest = vec![0u8; len[0] as usize + 2];
            stream.read_exact(&mut rest)?;
        }
        ATYP_V6 => {
            let mut rest = [0u8; 18];
            stream.read_exact(&mut rest)?;
        }
        other => {
            return Err(ProxyboundError::HopRejected(format!(
                "SOCKS5: unknown address type 0x{:02X} in reply",
                other
            )));
        }
    }
    Ok(())
}

/// Full negotiation on `stream`: method selection, optional auth, CONNECT.
pub fn handshake<S: Read + Write>(
    stream: &mut S,
    target: &Target,
    credentials: Option<(&str, &str)>,
) -> Result<()> {
    stream.write_all(&encode_methods(credentials.is_some()))?;

    let mut selection = [0u8; 2];
    stream.read_exact(&mut selection)?;
    let method = decode_method_selection(&selection)?;

    match method {
        METHOD_NO_AUTH => {}
        METHOD_USERPASS => {
            let (username, password) = credentials.ok_or_else(|| {
                ProxyboundError::HopRejected(
                    "SOCKS5: proxy demands credentials, none configured".to_string(),
                )
            })?;
            stream.write_all(&encode_userpass(username, password)?)?;
            let mut reply = [0u8; 2];
            stream.read_exact(&mut reply)?;
            decode_userpass_reply(&reply)?;
        }
        other => {
            return Err(ProxyboundError::HopRejected(format!(
                "SOCKS5: unsupported authentication method 0x{:02X}",
                other
            )));
        }
    }

    stream.write_all(&encode_connect(target)?)?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head)?;
    let atyp = decode_reply_head(&head)?;
    drain_bound_addr(stream, atyp)?;

    debug!("SOCKS5: relay granted for {}:{}", target.host_string(), target.port);
    Ok(())
}
