//! Per-connection transport wrapper.
//!
//! Wraps one accepted socket in a size-limited buffered reader and a
//! buffered writer. The read allowance caps how many bytes a single command
//! decode may consume; it is restored before every decode so an exhausted
//! allowance cannot starve later commands, while still bounding each one.

use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Take};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Default per-command read allowance in bytes (1 MiB).
pub const MAX_READ: u64 = 1024 * 1024;

/// One accepted connection's reader, writer and closer.
///
/// A session is owned by exactly one dispatch task from accept to close.
pub struct Session {
    reader: Take<BufReader<OwnedReadHalf>>,
    writer: BufWriter<OwnedWriteHalf>,
    limit: u64,
}

impl Session {
    /// Wrap an accepted stream. `limit` is the per-command read allowance.
    pub fn new(stream: TcpStream, limit: u64) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half).take(limit),
            writer: BufWriter::new(write_half),
            limit,
        }
    }

    /// Restore the read allowance to its maximum. Called before every
    /// command decode.
    pub fn reset_limit(&mut self) {
        self.reader.set_limit(self.limit);
    }

    /// Size-limited buffered reader over the socket. Once the allowance is
    /// spent, reads report end-of-input until [`Session::reset_limit`].
    pub fn reader(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin) {
        &mut self.reader
    }

    /// Buffered writer over the socket.
    pub fn writer(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        &mut self.writer
    }

    /// Close the connection. Flushes what it can and signals end-of-stream
    /// to the peer; shutdown errors are ignored since the session is
    /// finished either way.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
