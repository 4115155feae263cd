//! Lookahead over the first bytes of a connection.
//!
//! Agents may reach the hub through a load balancer that prepends a
//! `PROXY ...\r\n` line. The preamble is consumed and discarded, leading
//! whitespace is skipped, and the first meaningful byte decides whether the
//! stream is served as JSON. Every byte looked at but not consumed stays
//! available to the decoder through [`PeekReader`].

use std::io::{self, BufRead, Read};

/// Literal opening a proxy preamble line.
pub(crate) const PROXY_SIGNATURE: &[u8] = b"PROXY ";

/// Longest preamble line accepted, terminator included.
const MAX_PREAMBLE_BYTES: u64 = 512;

/// Number of buffered bytes reported for an unrecognised payload.
const PREFIX_REPORT_BYTES: usize = 16;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Buffered reader that can look ahead without consuming.
#[derive(Debug)]
pub(crate) struct PeekReader<R> {
    inner: R,
    buffer: Vec<u8>,
    position: usize,
}

impl<R: Read> PeekReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            position: 0,
        }
    }

    /// Returns up to `len` unread bytes, reading until that many are
    /// buffered or the stream ends. A shorter slice means end of stream.
    pub(crate) fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        while self.available() < len {
            if self.fill_more()? == 0 {
                break;
            }
        }
        let end = self.buffer.len().min(self.position + len);
        Ok(&self.buffer[self.position..end])
    }

    /// Unread bytes already held in the buffer.
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buffer[self.position..]
    }

    fn available(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn skip(&mut self, amount: usize) {
        self.position = self.buffer.len().min(self.position + amount);
        if self.position == self.buffer.len() {
            self.buffer.clear();
            self.position = 0;
        }
    }

    fn fill_more(&mut self) -> io::Result<usize> {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        let read = read_with_retry(&mut self.inner, &mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(read)
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.available() == 0 {
            if buf.len() >= READ_CHUNK_BYTES {
                return self.inner.read(buf);
            }
            if self.fill_more()? == 0 {
                return Ok(0);
            }
        }
        let count = self.available().min(buf.len());
        buf[..count].copy_from_slice(&self.buffer[self.position..self.position + count]);
        self.skip(count);
        Ok(count)
    }
}

impl<R: Read> BufRead for PeekReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.available() == 0 {
            self.fill_more()?;
        }
        Ok(self.buffered())
    }

    fn consume(&mut self, amount: usize) {
        self.skip(amount);
    }
}

fn read_with_retry<R: Read>(reader: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

/// Consumes a leading proxy preamble line, returning it without its line
/// terminator. Streams that end before the signature is complete are left
/// untouched, and the lookahead stops at the first byte that rules the
/// signature out so short requests are never held back.
///
/// # Errors
///
/// Fails on read errors and when the preamble has no newline within the
/// accepted length.
pub(crate) fn strip_proxy_preamble<R: Read>(
    reader: &mut PeekReader<R>,
) -> io::Result<Option<String>> {
    for len in 1..=PROXY_SIGNATURE.len() {
        let seen = reader.peek(len)?;
        if seen.len() < len || seen[len - 1] != PROXY_SIGNATURE[len - 1] {
            return Ok(None);
        }
    }
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_PREAMBLE_BYTES)
        .read_until(b'\n', &mut line)?;
    if line.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "proxy preamble is not terminated by a newline",
        ));
    }
    let text = String::from_utf8_lossy(&line);
    Ok(Some(text.trim_end_matches(['\r', '\n']).to_owned()))
}

/// What the first meaningful byte of a stream announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    /// The stream opens a JSON object.
    Structured,
    /// Anything else; carries up to 16 already-buffered bytes.
    Unrecognised(Vec<u8>),
}

/// Skips leading whitespace and classifies the payload. Returns `None` when
/// the stream ends first.
///
/// # Errors
///
/// Propagates read errors.
pub(crate) fn sniff_payload<R: Read>(reader: &mut PeekReader<R>) -> io::Result<Option<Payload>> {
    loop {
        let Some(&byte) = reader.peek(1)?.first() else {
            return Ok(None);
        };
        match byte {
            b' ' | b'\r' | b'\n' | b'\t' => reader.skip(1),
            b'{' => return Ok(Some(Payload::Structured)),
            _ => {
                let prefix = reader.buffered();
                let len = prefix.len().min(PREFIX_REPORT_BYTES);
                return Ok(Some(Payload::Unrecognised(prefix[..len].to_vec())));
            }
        }
    }
}
