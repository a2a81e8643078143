//! TCP command-dispatch server.
//!
//! Accepts connections, spawns one dispatch task per connection, and routes
//! every decoded command through the router. Stopping the server halts the
//! accept loop only; connections that are already open keep their dispatch
//! tasks until their transport goes away.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::protocol::{DecodeError, Protocol};
use crate::router::Router;
use crate::session::{Session, MAX_READ};
use crate::stats::{Stats, StatsSnapshot};

/// Errors that terminate [`Server::run`] before the accept loop starts.
#[derive(Debug)]
pub enum ServerError {
    /// The listening socket could not be bound.
    Bind(String, io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ServerError {}

/// A command server bound to one address, one router and one protocol.
///
/// The router and protocol are fixed at construction. `run` owns the accept
/// loop; `stop` may be called from any task or thread, any number of times.
pub struct Server {
    addr: String,
    router: Arc<Router>,
    protocol: Arc<dyn Protocol>,
    stats: Arc<Stats>,
    local_addr: RwLock<Option<SocketAddr>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    max_read: u64,
}

impl Server {
    /// Create an unstarted server. Nothing is bound until [`Server::run`].
    pub fn new(addr: impl Into<String>, router: Router, protocol: impl Protocol + 'static) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Server {
            addr: addr.into(),
            router: Arc::new(router),
            protocol: Arc::new(protocol),
            stats: Arc::new(Stats::new()),
            local_addr: RwLock::new(None),
            stop_tx,
            stop_rx,
            max_read: MAX_READ,
        }
    }

    /// Override the per-command read allowance in bytes.
    ///
    /// Applies to connections accepted after the call, which in practice
    /// means it should be set before handing the server to `run`.
    pub fn set_max_read(&mut self, limit: u64) {
        self.max_read = limit;
    }

    /// Bind the listening socket and serve until [`Server::stop`] is called.
    ///
    /// Binding failures are returned; accept failures are logged and the
    /// loop continues. Returns `Ok(())` once the stop signal is observed.
    /// The listening socket closes when this returns, while dispatch tasks
    /// for accepted connections keep running independently.
    pub async fn run(&self) -> Result<(), ServerError> {
        // The stop latch is checked before binding: a stopped server never
        // opens a new listener.
        if *self.stop_rx.borrow() {
            info!("stop signaled, not starting accept loop");
            return Ok(());
        }

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| ServerError::Bind(self.addr.clone(), e))?;

        self.stats.record_start(Utc::now());
        if let Ok(addr) = listener.local_addr() {
            *self.local_addr.write().unwrap() = Some(addr);
        }
        info!(addr = %self.addr, "server listening");

        let mut stop = self.stop_rx.clone();
        loop {
            // The stop flag is latched: it is checked before each accept and
            // rechecked after accept failures, so a stop that lands while the
            // loop is busy elsewhere is still honored on the next pass.
            if *stop.borrow() {
                info!("stop signaled, leaving accept loop");
                return Ok(());
            }

            tokio::select! {
                _ = stop.changed() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "accepted connection");
                        let session = Session::new(stream, self.max_read);
                        let router = Arc::clone(&self.router);
                        let protocol = Arc::clone(&self.protocol);
                        let stats = Arc::clone(&self.stats);
                        tokio::spawn(async move {
                            handle_client(session, peer, router, protocol, stats).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                    }
                },
            }
        }
    }

    /// Signal the accept loop to stop taking new connections.
    ///
    /// Idempotent and non-blocking. Repeated calls observe the same latched
    /// signal, and calling before `run` makes `run` return as soon as it has
    /// bound. Open connections are left untouched.
    pub fn stop(&self) {
        // send only fails when every receiver is gone; the server holds one.
        let _ = self.stop_tx.send(true);
        info!("server stop requested");
    }

    /// Consistent snapshot of the server counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Address the listener is actually bound to, `None` until `run` binds.
    ///
    /// Differs from the configured address when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().unwrap()
    }
}

/// Per-connection dispatch loop: decode a command, route it, execute the
/// handler, deliver the outcome, repeat.
///
/// Handler and protocol errors are reported to the client and the
/// connection lives on. Transport errors and failed deliveries tear the
/// connection down. The active-client count covers exactly the lifetime of
/// this task.
async fn handle_client(
    mut session: Session,
    peer: SocketAddr,
    router: Arc<Router>,
    protocol: Arc<dyn Protocol>,
    stats: Arc<Stats>,
) {
    let _client = stats.track_client();

    loop {
        // Each command gets a fresh read allowance.
        session.reset_limit();

        let cmd = match protocol.decode(session.reader()).await {
            Ok(cmd) => cmd,
            Err(DecodeError::Transport(e)) => {
                debug!(peer = %peer, error = %e, "connection unusable, closing");
                session.close().await;
                return;
            }
            Err(DecodeError::Protocol(message)) => {
                trace!(peer = %peer, %message, "malformed command");
                if let Err(e) = protocol.send_error(session.writer(), &message).await {
                    debug!(peer = %peer, error = %e, "error reply failed, closing");
                    session.close().await;
                    return;
                }
                continue;
            }
        };

        trace!(peer = %peer, command = cmd.name(), "dispatching");
        match router.lookup(cmd.name()).exec(&cmd).await {
            Ok(reply) => {
                if let Err(e) = protocol.send_reply(session.writer(), &reply).await {
                    debug!(peer = %peer, error = %e, "reply failed, closing");
                    session.close().await;
                    return;
                }
            }
            Err(err) => {
                if let Err(e) = protocol.send_error(session.writer(), err.message()).await {
                    debug!(peer = %peer, error = %e, "error reply failed, closing");
                    session.close().await;
                    return;
                }
            }
        }
    }
}
