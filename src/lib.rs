//! Protocol-agnostic TCP command dispatch.
//!
//! The crate pairs an accept loop with one dispatch loop per connection:
//! a [`Protocol`] decodes commands off the wire, a [`Router`] maps command
//! names to [`Handler`]s, and the outcome travels back through the same
//! protocol. Stopping is cooperative and halts only the accept loop;
//! open connections are served until their transport goes away.

pub mod config;
pub mod protocol;
pub mod protocols;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use protocol::{Command, DecodeError, Protocol};
pub use router::{Handler, HandlerError, Router};
pub use server::{Server, ServerError};
pub use session::{Session, MAX_READ};
pub use stats::{Stats, StatsSnapshot};
