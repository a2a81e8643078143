//! Command routing.
//!
//! Maps a command name to the handler that executes it. Routers are built
//! before the server starts and never mutated afterwards, so concurrent
//! lookups from connection tasks need no synchronization.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::protocol::Command;

/// Executes one decoded command.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the command, producing the reply bytes sent back on success.
    ///
    /// An error is reported to the client as an error reply; it does not
    /// terminate the connection.
    async fn exec(&self, cmd: &Command) -> Result<Bytes, HandlerError>;
}

/// Error returned by a handler; its message is reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create an error carrying the client-visible message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The client-visible message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Command router: exact name match, with a fallback for unknown names.
pub struct Router {
    handlers: HashMap<String, Box<dyn Handler>>,
    unknown: Box<dyn Handler>,
}

impl Router {
    /// Create a router that sends every unrecognized command name to
    /// `unknown`.
    pub fn new(unknown: impl Handler + 'static) -> Self {
        Self {
            handlers: HashMap::new(),
            unknown: Box::new(unknown),
        }
    }

    /// Register the handler for a command name. Names are matched exactly;
    /// registration happens before the server takes ownership of the router.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Handler for a command name, or the fallback when no name matches.
    /// Never fails: absence is modeled as the fallback handler.
    pub fn lookup(&self, name: &str) -> &dyn Handler {
        match self.handlers.get(name) {
            Some(handler) => handler.as_ref(),
            None => self.unknown.as_ref(),
        }
    }
}
