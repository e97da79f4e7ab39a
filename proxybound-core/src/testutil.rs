//! In-memory stream stand-ins for handshake and engine tests.

use std::io::{self, Read, Write};

/// A stream whose peer side is pre-scripted: reads pull from a fixed reply
/// buffer, writes are recorded for inspection.
pub struct ScriptedStream {
    replies: Vec<u8>,
    read_pos: usize,
    written: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(replies: Vec<u8>) -> Self {
        Self {
            replies,
            read_pos: 0,
            written: Vec::new(),
        }
    }

    /// Everything the code under test sent to the "proxy".
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Scripted bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.replies[self.read_pos..]
    }

    /// Replace the peer script, as if the socket had been (re)connected to
    /// a different endpoint. The write log is kept.
    pub fn load(&mut self, replies: Vec<u8>) {
        self.replies = replies;
        self.read_pos = 0;
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = &self.replies[self.read_pos..];
        if available.is_empty() {
            // An exhausted script behaves like a peer that stopped talking.
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "scripted stream exhausted",
            ));
        }
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
