//! Newline-delimited JSON framing with a bounded read buffer
//!
//! The reader accumulates bytes until `\n`, skipping empty lines and
//! tolerating `\r\n`. A line longer than the configured cap is an
//! [`TransportError::Overflow`]: the line is not truncated, the stream is
//! aborted. The writer appends `\n` and flushes before returning.

use crate::error::{Result, TransportError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Default cap on a single buffered line: 1 MiB
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

/// Bounded line reader over a byte stream
pub struct LineReader<R> {
    inner: BufReader<R>,
    max_line_len: usize,
    buf: Vec<u8>,
    chunk: [u8; 8192],
    /// Bytes carried over from the previous read that belong to later lines.
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a reader with the default 1 MiB cap
    pub fn new(inner: R) -> Self {
        Self::with_max_line_len(inner, DEFAULT_MAX_LINE_LEN)
    }

    /// Create a reader with an explicit cap
    pub fn with_max_line_len(inner: R, max_line_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_line_len,
            buf: Vec::new(),
            chunk: [0u8; 8192],
            pending: Vec::new(),
        }
    }

    /// Read the next non-empty line, without its terminator
    ///
    /// Returns `Ok(None)` at EOF. A final unterminated line is yielded
    /// as-is.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            // Drain carried-over bytes before touching the stream.
            while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                if pos > self.max_line_len {
                    return Err(TransportError::Overflow {
                        limit: self.max_line_len,
                    });
                }
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if !line.is_empty() {
                    return Ok(Some(line));
                }
            }

            self.buf.append(&mut self.pending);
            if self.buf.len() > self.max_line_len {
                return Err(TransportError::Overflow {
                    limit: self.max_line_len,
                });
            }

            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                // EOF: a partial line is still a line.
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let mut line = std::mem::take(&mut self.buf);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(if line.is_empty() { None } else { Some(line) });
            }

            let data = &self.chunk[..n];
            match data.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.buf.extend_from_slice(&data[..pos]);
                    self.pending.extend_from_slice(&data[pos + 1..]);
                    if self.buf.len() > self.max_line_len {
                        return Err(TransportError::Overflow {
                            limit: self.max_line_len,
                        });
                    }
                    let mut line = std::mem::take(&mut self.buf);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if !line.is_empty() {
                        return Ok(Some(line));
                    }
                }
                None => {
                    self.buf.extend_from_slice(data);
                    if self.buf.len() > self.max_line_len {
                        return Err(TransportError::Overflow {
                            limit: self.max_line_len,
                        });
                    }
                }
            }
        }
    }
}

/// Line writer that flushes every line
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Wrap a byte sink
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one line, appending `\n`, and flush
    pub async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.inner.write_all(line).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut the sink down, signalling EOF to the peer
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
