//! switchboard: a protocol-agnostic TCP command dispatch server.
//!
//! The binary wires a small demo command set into the dispatch core:
//! - `PING` answers `PONG`
//! - `ECHO` answers its own arguments
//! - `TIME` answers the current UTC time
//!
//! Anything else is answered by the fallback handler with an error.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use switchboard::config::Config;
use switchboard::protocols::line::LineProtocol;
use switchboard::{Command, Handler, HandlerError, Router, Server};

struct Ping;

#[async_trait]
impl Handler for Ping {
    async fn exec(&self, _cmd: &Command) -> Result<Bytes, HandlerError> {
        Ok(Bytes::from_static(b"PONG"))
    }
}

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn exec(&self, cmd: &Command) -> Result<Bytes, HandlerError> {
        let mut out = Vec::new();
        for (i, arg) in cmd.args().iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            out.extend_from_slice(arg);
        }
        Ok(out.into())
    }
}

struct Time;

#[async_trait]
impl Handler for Time {
    async fn exec(&self, _cmd: &Command) -> Result<Bytes, HandlerError> {
        Ok(Utc::now().to_rfc3339().into_bytes().into())
    }
}

struct Unrouted;

#[async_trait]
impl Handler for Unrouted {
    async fn exec(&self, cmd: &Command) -> Result<Bytes, HandlerError> {
        Err(HandlerError::new(format!("unknown command {}", cmd.name())))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_read = config.max_read,
        "Starting switchboard server"
    );

    let mut router = Router::new(Unrouted);
    router.register("PING", Ping);
    router.register("ECHO", Echo);
    router.register("TIME", Time);

    let mut server = Server::new(config.listen, router, LineProtocol);
    server.set_max_read(config.max_read);
    let server = Arc::new(server);

    {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                server.stop();
            }
        });
    }

    server.run().await?;
    Ok(())
}
