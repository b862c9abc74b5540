//! Single-direction byte forwarding.
//!
//! A pipe copies whatever it reads from `source` to `destination` in chunks of
//! at most [`BUFFER_SIZE`] bytes until a zero-byte read, an I/O error or
//! cancellation. Content is never inspected.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ForwardError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Size of the per-direction relay buffer.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Which way a pipe moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToBroker,
    BrokerToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToBroker => "client->broker",
            Direction::BrokerToClient => "broker->client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a pipe stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    /// The source reported end of stream.
    Eof,
    /// The cancellation signal fired first.
    Cancelled,
}

/// Summary of a finished pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeReport {
    pub direction: Direction,
    pub bytes: u64,
    pub end: PipeEnd,
}

/// Relay bytes from `source` to `destination` until EOF, error or `cancel`.
///
/// A read or write that is in flight when `cancel` fires is dropped, not
/// completed; bytes already read but not yet written are lost.
pub async fn forward<R, W>(
    mut source: R,
    mut destination: W,
    mut cancel: ShutdownSignal,
    direction: Direction,
) -> Result<PipeReport, ForwardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut bytes: u64 = 0;
    let report = |bytes, end| PipeReport { direction, bytes, end };

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.recv() => return Ok(report(bytes, PipeEnd::Cancelled)),
            res = source.read(&mut buf) => {
                res.map_err(|source| ForwardError::Read { direction, source })?
            }
        };

        if n == 0 {
            return Ok(report(bytes, PipeEnd::Eof));
        }

        tokio::select! {
            biased;
            _ = cancel.recv() => return Ok(report(bytes, PipeEnd::Cancelled)),
            res = write_chunk(&mut destination, &buf[..n]) => {
                res.map_err(|source| ForwardError::Write { direction, source })?
            }
        }

        bytes += n as u64;
        metrics::record_bytes(direction, n);
        tracing::trace!(direction = %direction, bytes = n, "Forwarded chunk");
    }
}

async fn write_chunk<W>(destination: &mut W, chunk: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    destination.write_all(chunk).await?;
    destination.flush().await
}
