//! Wire-protocol seam.
//!
//! The server core defines no on-wire byte layout. A [`Protocol`]
//! implementation decodes one command per round trip from a connection's
//! reader and encodes success and error replies onto its writer. The core
//! only requires that decode failures are classified: transport failures
//! end the connection, protocol violations are reported and survived.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncBufRead, AsyncWrite};

/// A decoded, routable client request.
///
/// The name selects a handler; the arguments are opaque to the server core
/// and interpreted only by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    /// Create a command from its routing name and arguments.
    pub fn new(name: impl Into<String>, args: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Name the command is routed by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded arguments, in wire order.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }
}

/// Why decoding a command failed.
///
/// The split is load-bearing for the dispatch loop: `Transport` closes the
/// connection without a reply, `Protocol` is reported to the client and the
/// connection kept alive.
#[derive(Debug)]
pub enum DecodeError {
    /// The underlying transport is unusable: disconnect, I/O failure, or
    /// framing damage past the point of resynchronization.
    Transport(io::Error),
    /// The bytes were readable but violate the protocol. Carries the
    /// message sent back to the client; the next command may still be read.
    Protocol(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Transport(e) => write!(f, "transport unusable: {}", e),
            DecodeError::Protocol(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Wire-format codec consumed by the server core.
///
/// One implementation is shared by every connection, so implementations
/// hold no per-connection state.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Decode one command from the session's reader.
    async fn decode(
        &self,
        reader: &mut (dyn AsyncBufRead + Send + Unpin),
    ) -> Result<Command, DecodeError>;

    /// Encode and send a success reply.
    ///
    /// Any error here means the transport is suspect; the caller closes the
    /// connection.
    async fn send_reply(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        reply: &[u8],
    ) -> io::Result<()>;

    /// Encode and send an error reply carrying `message`.
    ///
    /// Same escalation contract as [`Protocol::send_reply`].
    async fn send_error(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        message: &str,
    ) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accessors() {
        let cmd = Command::new("lease", vec![Bytes::from_static(b"q1")]);
        assert_eq!(cmd.name(), "lease");
        assert_eq!(cmd.args(), &[Bytes::from_static(b"q1")]);
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::Protocol("bad arguments".to_string());
        assert_eq!(err.to_string(), "bad arguments");

        let err = DecodeError::Transport(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "peer went away",
        ));
        assert!(err.to_string().contains("transport unusable"));
    }

    #[test]
    fn test_decode_error_classification_is_structural() {
        // The dispatch loop branches on the variant, never on message text.
        let fatal = DecodeError::Transport(io::ErrorKind::UnexpectedEof.into());
        let recoverable = DecodeError::Protocol("unknown syntax".to_string());
        assert!(matches!(fatal, DecodeError::Transport(_)));
        assert!(matches!(recoverable, DecodeError::Protocol(_)));
    }
}
