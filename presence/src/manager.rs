use crate::broadcaster::Broadcaster;
use crate::connection::{ConnectionHandle, FrameSink, VisitorId};
use crate::message::Snapshot;
use crate::registry::ConnectionRegistry;
use log::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Default period between keep-alive frames on an idle connection.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest keep-alive period accepted; tokio intervals cannot be zero.
pub const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Entry point for the connection lifecycle: every attach and detach goes
/// through here and is followed by exactly one broadcast.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    // Held across snapshot and fan-out so the last frame any client sees is
    // never older than one it already received.
    broadcast_lock: Mutex<()>,
    keep_alive_interval: Duration,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_keep_alive_interval(DEFAULT_KEEP_ALIVE_INTERVAL)
    }

    /// Periods shorter than [`MIN_KEEP_ALIVE_INTERVAL`] are raised to it.
    pub fn with_keep_alive_interval(keep_alive_interval: Duration) -> Self {
        let keep_alive_interval = if keep_alive_interval < MIN_KEEP_ALIVE_INTERVAL {
            warn!(
                "Keep-alive interval {:?} is too short, using {:?}",
                keep_alive_interval, MIN_KEEP_ALIVE_INTERVAL
            );
            MIN_KEEP_ALIVE_INTERVAL
        } else {
            keep_alive_interval
        };

        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            broadcast_lock: Mutex::new(()),
            keep_alive_interval,
        }
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// `Connecting -> Attached`: wrap the transport in a handle, register it
    /// and broadcast so the new client (and everyone else) sees the new count.
    pub fn attach(&self, visitor_id: VisitorId, sink: impl FrameSink + 'static) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(visitor_id, sink));
        handle.mark_attached();
        self.registry.attach(handle.clone());
        info!(
            "Attached connection {} for visitor {} ({} open)",
            handle.id(),
            handle.visitor_id(),
            self.visitor_connections(handle.visitor_id())
        );

        self.broadcast_current_state();
        handle
    }

    /// `Attached -> Detached`. Safe to call any number of times and from
    /// racing tasks; only the first call unregisters and rebroadcasts.
    pub fn detach(&self, handle: &ConnectionHandle) {
        if !self.teardown(handle) {
            return;
        }
        self.broadcast_current_state();
    }

    /// Push the current counts to every connection, detaching any connection
    /// whose push failed and rebroadcasting until a fan-out completes cleanly.
    pub fn broadcast_current_state(&self) {
        let _serialized = self.broadcast_lock.lock();
        loop {
            let dead = self.broadcaster.broadcast_current_state();
            let mut removed = false;
            for handle in &dead {
                removed |= self.teardown(handle);
            }
            if !removed {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::now(self.registry.snapshot())
    }

    /// Number of live connections for a single visitor.
    pub fn visitor_connections(&self, visitor_id: &str) -> usize {
        self.registry.visitor_connections(visitor_id)
    }

    fn teardown(&self, handle: &ConnectionHandle) -> bool {
        if !handle.begin_detach() {
            trace!("Connection {} already detached", handle.id());
            return false;
        }
        let removed = self.registry.detach(handle);
        if removed {
            info!(
                "Detached connection {} for visitor {} (open for {}s)",
                handle.id(),
                handle.visitor_id(),
                (chrono::Utc::now() - handle.created_at()).num_seconds()
            );
        }
        removed
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::message::Counts;
    use tokio::sync::mpsc;

    fn channel() -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    fn counts_of(frame: &str) -> Counts {
        let json = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("snapshot frame");
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        Counts {
            total_connections: value["totalConnections"].as_u64().unwrap() as usize,
            unique_visitors: value["uniqueVisitors"].as_u64().unwrap() as usize,
        }
    }

    fn last_counts(rx: &mut mpsc::UnboundedReceiver<String>) -> Counts {
        let mut last = None;
        while let Ok(frame) = rx.try_recv() {
            last = Some(counts_of(&frame));
        }
        last.expect("at least one snapshot frame")
    }

    fn counts(total_connections: usize, unique_visitors: usize) -> Counts {
        Counts {
            total_connections,
            unique_visitors,
        }
    }

    #[test]
    fn test_attach_sends_initial_snapshot_to_new_connection() {
        let manager = Manager::new();
        let (tx, mut rx) = channel();

        let handle = manager.attach("v1".to_string(), tx);

        assert_eq!(handle.state(), ConnectionState::Attached);
        assert_eq!(counts_of(&rx.try_recv().unwrap()), counts(1, 1));
    }

    #[test]
    fn test_scenario_counts_follow_attach_and_detach() {
        let manager = Manager::new();
        let (tx1, mut r1) = channel();
        let (tx2, mut r2) = channel();
        let (tx3, mut r3) = channel();

        let h1 = manager.attach("v1".to_string(), tx1);
        assert_eq!(manager.snapshot().counts(), counts(1, 1));
        let h2 = manager.attach("v1".to_string(), tx2);
        assert_eq!(manager.snapshot().counts(), counts(2, 1));
        let h3 = manager.attach("v2".to_string(), tx3);
        assert_eq!(manager.snapshot().counts(), counts(3, 2));
        assert_eq!(last_counts(&mut r1), counts(3, 2));

        manager.detach(&h1);
        assert_eq!(manager.snapshot().counts(), counts(2, 2));
        assert_eq!(last_counts(&mut r2), counts(2, 2));

        manager.detach(&h2);
        assert_eq!(manager.snapshot().counts(), counts(1, 1));
        assert_eq!(manager.visitor_connections("v1"), 0);
        assert_eq!(last_counts(&mut r3), counts(1, 1));

        manager.detach(&h3);
        assert_eq!(manager.snapshot().counts(), counts(0, 0));
    }

    #[test]
    fn test_detach_twice_decrements_once_and_broadcasts_once() {
        let manager = Manager::new();
        let (tx1, _r1) = channel();
        let (tx2, mut r2) = channel();
        let h1 = manager.attach("v1".to_string(), tx1);
        let _h2 = manager.attach("v2".to_string(), tx2);
        while r2.try_recv().is_ok() {}

        manager.detach(&h1);
        manager.detach(&h1);

        assert_eq!(manager.snapshot().counts(), counts(1, 1));
        assert_eq!(counts_of(&r2.try_recv().unwrap()), counts(1, 1));
        assert!(r2.try_recv().is_err());
    }

    #[test]
    fn test_failed_push_detaches_dead_connection() {
        let manager = Manager::new();
        let (tx1, r1) = channel();
        let (tx2, mut r2) = channel();
        let h1 = manager.attach("v1".to_string(), tx1);
        let _h2 = manager.attach("v2".to_string(), tx2);
        drop(r1);

        let (tx3, _r3) = channel();
        let _h3 = manager.attach("v3".to_string(), tx3);

        assert_eq!(h1.state(), ConnectionState::Detached);
        assert_eq!(manager.snapshot().counts(), counts(2, 2));
        assert_eq!(last_counts(&mut r2), counts(2, 2));

        // The later close notification for h1 must not decrement again.
        manager.detach(&h1);
        assert_eq!(manager.snapshot().counts(), counts(2, 2));
    }

    #[test]
    fn test_keep_alive_interval_is_never_zero() {
        assert_eq!(
            Manager::with_keep_alive_interval(Duration::ZERO).keep_alive_interval(),
            MIN_KEEP_ALIVE_INTERVAL
        );
        assert_eq!(
            Manager::with_keep_alive_interval(Duration::from_secs(30)).keep_alive_interval(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_last_frame_matches_final_state_under_concurrent_attach() {
        let manager = Arc::new(Manager::new());
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let mut receivers = Vec::new();
                    let mut handles = Vec::new();
                    for tab in 0..25 {
                        let (tx, rx) = channel();
                        receivers.push(rx);
                        handles.push(manager.attach(format!("v{}", (worker + tab) % 10), tx));
                    }
                    (receivers, handles)
                })
            })
            .collect();

        let mut receivers = Vec::new();
        let mut handles = Vec::new();
        for worker in workers {
            let (rx, h) = worker.join().unwrap();
            receivers.extend(rx);
            handles.extend(h);
        }

        let settled = manager.snapshot().counts();
        assert_eq!(settled, counts(200, 10));
        for rx in receivers.iter_mut() {
            assert_eq!(last_counts(rx), settled);
        }
    }

    #[test]
    fn test_same_visitor_many_tabs_counts_one_unique() {
        let manager = Manager::new();
        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (tx, rx) = channel();
            receivers.push(rx);
            manager.attach("tabby".to_string(), tx);
        }

        assert_eq!(manager.snapshot().counts(), counts(4, 1));
        for rx in receivers.iter_mut() {
            assert_eq!(last_counts(rx), counts(4, 1));
        }
    }
}
