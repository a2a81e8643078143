//! Server statistics shared across connection tasks.
//!
//! The stats block is the only state mutated by more than one task. Every
//! access goes through a single `RwLock` held just long enough to update or
//! copy the record, never across I/O.

use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Point-in-time copy of the server statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// When the server started listening (`None` until a successful bind).
    pub started: Option<DateTime<Utc>>,
    /// Number of currently connected clients.
    pub active_clients: u64,
}

/// Lock-guarded statistics block.
#[derive(Debug, Default)]
pub struct Stats {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Inner {
    started: Option<DateTime<Utc>>,
    active_clients: u64,
}

impl Stats {
    /// Create an empty stats block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the listen time. Called once, immediately after a successful
    /// bind.
    pub fn record_start(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write().unwrap();
        inner.started = Some(at);
    }

    /// Mark one client connected. The returned guard marks it disconnected
    /// again when dropped, so every entry pairs with exactly one exit no
    /// matter which path the connection task takes out.
    pub fn track_client(&self) -> ClientGuard<'_> {
        {
            let mut inner = self.inner.write().unwrap();
            inner.active_clients += 1;
        }
        ClientGuard { stats: self }
    }

    /// Consistent copy of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read().unwrap();
        StatsSnapshot {
            started: inner.started,
            active_clients: inner.active_clients,
        }
    }
}

/// Live-connection token; decrements the active-client count exactly once
/// when dropped.
#[derive(Debug)]
pub struct ClientGuard<'a> {
    stats: &'a Stats,
}

impl Drop for ClientGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.stats.inner.write() {
            inner.active_clients -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_stats() {
        let stats = Stats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.started, None);
        assert_eq!(snap.active_clients, 0);
    }

    #[test]
    fn test_record_start() {
        let stats = Stats::new();
        let now = Utc::now();
        stats.record_start(now);
        assert_eq!(stats.snapshot().started, Some(now));
    }

    #[test]
    fn test_track_client_pairs_entry_and_exit() {
        let stats = Stats::new();

        let first = stats.track_client();
        let second = stats.track_client();
        assert_eq!(stats.snapshot().active_clients, 2);

        drop(first);
        assert_eq!(stats.snapshot().active_clients, 1);

        drop(second);
        assert_eq!(stats.snapshot().active_clients, 0);
    }

    #[test]
    fn test_concurrent_tracking_returns_to_zero() {
        let stats = Arc::new(Stats::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let guard = stats.track_client();
                    assert!(stats.snapshot().active_clients >= 1);
                    drop(guard);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.snapshot().active_clients, 0);
    }
}
