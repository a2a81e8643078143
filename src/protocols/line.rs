//! Line-oriented command protocol.
//!
//! Requests are one command per line: the command name, optionally followed
//! by whitespace-separated arguments, terminated by a newline. Replies reuse
//! the line framing with a one-byte marker, `+` for success payloads and `-`
//! for error messages.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Command, DecodeError, Protocol};

/// Whitespace-separated commands, one per CRLF-terminated line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineProtocol;

#[async_trait]
impl Protocol for LineProtocol {
    async fn decode(
        &self,
        reader: &mut (dyn AsyncBufRead + Send + Unpin),
    ) -> Result<Command, DecodeError> {
        let mut buf = Vec::new();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(DecodeError::Transport)?;

        if n == 0 {
            // End of stream between commands.
            return Err(DecodeError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        if !buf.ends_with(b"\n") {
            // Stream cut off mid-line, or the read allowance ran out before
            // the terminator. No line boundary to resynchronize on, whatever
            // the consumed bytes happen to contain.
            return Err(DecodeError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "command line not terminated",
            )));
        }

        // The full line was consumed, so the stream stays aligned on a line
        // boundary even when the bytes are rejected here.
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                return Err(DecodeError::Protocol(
                    "invalid utf-8 in command".to_string(),
                ))
            }
        };

        let mut parts = line.split_whitespace();
        let name = match parts.next() {
            Some(name) => name.to_string(),
            None => return Err(DecodeError::Protocol("empty command".to_string())),
        };
        let args = parts
            .map(|arg| Bytes::copy_from_slice(arg.as_bytes()))
            .collect();
        Ok(Command::new(name, args))
    }

    async fn send_reply(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        reply: &[u8],
    ) -> io::Result<()> {
        writer.write_all(b"+").await?;
        writer.write_all(reply).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await
    }

    async fn send_error(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        message: &str,
    ) -> io::Result<()> {
        writer.write_all(b"-").await?;
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};
    use tokio_test::io::Builder;

    async fn decode_str(input: &str) -> Result<Command, DecodeError> {
        let mut reader = input.as_bytes();
        LineProtocol.decode(&mut reader).await
    }

    #[tokio::test]
    async fn test_decode_name_and_args() {
        let cmd = decode_str("ECHO hello world\r\n").await.unwrap();
        assert_eq!(cmd.name(), "ECHO");
        assert_eq!(cmd.args(), [&b"hello"[..], &b"world"[..]]);
    }

    #[tokio::test]
    async fn test_decode_name_only() {
        let cmd = decode_str("PING\r\n").await.unwrap();
        assert_eq!(cmd.name(), "PING");
        assert!(cmd.args().is_empty());
    }

    #[tokio::test]
    async fn test_decode_bare_newline_accepted() {
        let cmd = decode_str("PING\n").await.unwrap();
        assert_eq!(cmd.name(), "PING");
    }

    #[tokio::test]
    async fn test_decode_consumes_one_line_per_call() {
        let mut reader = &b"PING\r\nECHO hi\r\n"[..];
        let first = LineProtocol.decode(&mut reader).await.unwrap();
        let second = LineProtocol.decode(&mut reader).await.unwrap();
        assert_eq!(first.name(), "PING");
        assert_eq!(second.name(), "ECHO");
        assert_eq!(second.args(), [&b"hi"[..]]);
    }

    #[tokio::test]
    async fn test_decode_blank_line_is_protocol_error() {
        match decode_str("\r\n").await {
            Err(DecodeError::Protocol(msg)) => assert_eq!(msg, "empty command"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_invalid_utf8_is_protocol_error() {
        let mut reader = &b"\xff\xfe\n"[..];
        assert!(matches!(
            LineProtocol.decode(&mut reader).await,
            Err(DecodeError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_eof_is_transport_error() {
        assert!(matches!(
            decode_str("").await,
            Err(DecodeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_unterminated_line_is_transport_error() {
        assert!(matches!(
            decode_str("PING").await,
            Err(DecodeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_exhausted_allowance_beats_invalid_utf8() {
        // The allowance cuts the line before its terminator and the consumed
        // prefix is not valid UTF-8. The missing terminator decides: this is
        // a dead transport, not a reportable protocol error, so the rest of
        // the oversized line can never be misread as a fresh command.
        let data = &b"\xff\xffAB CDEF\r\n"[..];
        let mut reader = BufReader::new(data).take(4);
        assert!(matches!(
            LineProtocol.decode(&mut reader).await,
            Err(DecodeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_read_failure_is_transport_error() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = BufReader::new(mock);
        assert!(matches!(
            LineProtocol.decode(&mut reader).await,
            Err(DecodeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_send_reply_framing() {
        let mut out = Vec::new();
        LineProtocol.send_reply(&mut out, b"PONG").await.unwrap();
        assert_eq!(out, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_send_error_framing() {
        let mut out = Vec::new();
        LineProtocol.send_error(&mut out, "no such key").await.unwrap();
        assert_eq!(out, b"-no such key\r\n");
    }
}
