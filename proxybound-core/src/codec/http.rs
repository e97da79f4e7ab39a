//! HTTP CONNECT tunneling, with optional Basic proxy authorization.

use crate::codec::Target;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proxybound_common::{ProxyboundError, Result};
use std::io::{Read, Write};
use tracing::debug;

/// Response size guard; a CONNECT response has no business being larger.
const MAX_RESPONSE: usize = 4096;

/// Build the CONNECT request. IPv6 hosts are bracketed, hostnames pass
/// through verbatim.
pub fn encode_connect(target: &Target, credentials: Option<(&str, &str)>) -> String {
    let host = target.host_string();
    let mut request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
        host = host,
        port = target.port
    );
    if let Some((user, pass)) = credentials {
        let token = STANDARD.encode(format!("{}:{}", user, pass));
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", token));
    }
    request.push_str("\r\n");
    request
}

/// Extract the status code from the response status line.
pub fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(ProxyboundError::HopRejected(format!(
            "HTTP proxy: malformed status line {:?}",
            line.trim()
        )));
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            ProxyboundError::HopRejected(format!(
                "HTTP proxy: missing status code in {:?}",
                line.trim()
            ))
        })
}

/// Read the full response head, byte by byte, up to the blank line.
///
/// Every header line must be consumed here; anything left behind would be
/// replayed into the tunneled stream.
fn read_response_head<S: Read>(stream: &mut S) -> Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte)?;
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
        if head.len() > MAX_RESPONSE {
            return Err(ProxyboundError::HopRejected(
                "HTTP proxy: response head too large".to_string(),
            ));
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Full CONNECT exchange on `stream`; success iff the proxy answers 200.
pub fn handshake<S: Read + Write>(
    stream: &mut S,
    target: &Target,
    credentials: Option<(&str, &str)>,
) -> Result<()> {
    let request = encode_connect(target, credentials);
    stream.write_all(request.as_bytes())?;

    let head = read_response_head(stream)?;
    let status_line = head.lines().next().unwrap_or("");
    let code = parse_status_line(status_line)?;
    if code != 200 {
        return Err(ProxyboundError::HopRejected(format!(
            "HTTP proxy: CONNECT answered {}",
            code
        )));
    }

    debug!("HTTP: tunnel established to {}:{}", target.host_string(), target.port);
    Ok(())
}
