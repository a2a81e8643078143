//! Protocol implementations.
//!
//! The server core is protocol-agnostic; anything implementing
//! [`crate::protocol::Protocol`] plugs in. This module collects the
//! implementations that ship with the crate.
//!
//! - `line`: whitespace-separated commands, one per CRLF line. Used by the
//!   bundled binary and throughout the test suite.

pub mod line;
