use crate::connection::{ConnectionHandle, ConnectionId, VisitorId};
use crate::message::Counts;
use log::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct RegistryState {
    /// visitor_id -> that visitor's live handles. Never holds an empty set.
    visitors: HashMap<VisitorId, HashMap<ConnectionId, Arc<ConnectionHandle>>>,

    /// Always equal to the sum of the handle-set sizes above.
    total_connections: usize,
}

/// Live connection handles grouped by visitor.
///
/// Map and counter share one lock so that no reader ever sees the counter
/// and the map out of step. Reads (snapshots, fan-out) take the read side.
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Add `handle` under its visitor. Re-attaching a handle that is already
    /// present does not count it twice.
    pub fn attach(&self, handle: Arc<ConnectionHandle>) {
        let mut state = self.state.write();
        let inserted = state
            .visitors
            .entry(handle.visitor_id().clone())
            .or_default()
            .insert(handle.id().clone(), handle.clone())
            .is_none();

        if inserted {
            state.total_connections += 1;
        }

        trace!(
            "attach {} under visitor {}: total={}, unique={}",
            handle.id(),
            handle.visitor_id(),
            state.total_connections,
            state.visitors.len()
        );
    }

    /// Remove `handle`, pruning its visitor when the last handle goes.
    /// Returns false when the handle was not registered, leaving the counts
    /// untouched.
    pub fn detach(&self, handle: &ConnectionHandle) -> bool {
        let mut state = self.state.write();

        let Some(handles) = state.visitors.get_mut(handle.visitor_id()) else {
            return false;
        };
        if handles.remove(handle.id()).is_none() {
            return false;
        }
        if handles.is_empty() {
            state.visitors.remove(handle.visitor_id());
        }
        state.total_connections -= 1;

        trace!(
            "detach {} from visitor {}: total={}, unique={}",
            handle.id(),
            handle.visitor_id(),
            state.total_connections,
            state.visitors.len()
        );
        true
    }

    pub fn snapshot(&self) -> Counts {
        let state = self.state.read();
        Counts {
            total_connections: state.total_connections,
            unique_visitors: state.visitors.len(),
        }
    }

    /// Apply `f` to every registered handle.
    ///
    /// Handles are copied out under the read lock and `f` runs with the lock
    /// released, so `f` may call back into the registry (e.g. detach a dead
    /// handle) without deadlocking.
    pub fn for_each_handle<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ConnectionHandle>),
    {
        for handle in self.handles() {
            f(&handle);
        }
    }

    fn handles(&self) -> Vec<Arc<ConnectionHandle>> {
        let state = self.state.read();
        state
            .visitors
            .values()
            .flat_map(|handles| handles.values().cloned())
            .collect()
    }

    /// Handles currently registered for one visitor.
    pub fn visitor_connections(&self, visitor_id: &str) -> usize {
        self.state
            .read()
            .visitors
            .get(visitor_id)
            .map_or(0, HashMap::len)
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let state = self.state.read();
        let summed: usize = state.visitors.values().map(HashMap::len).sum();
        summed == state.total_connections && state.visitors.values().all(|h| !h.is_empty())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(visitor: &str) -> (Arc<ConnectionHandle>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ConnectionHandle::new(visitor.to_string(), tx)), rx)
    }

    fn counts(total_connections: usize, unique_visitors: usize) -> Counts {
        Counts {
            total_connections,
            unique_visitors,
        }
    }

    #[test]
    fn test_attach_detach_sequence_tracks_totals_and_visitors() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = handle("v1");
        let (h2, _r2) = handle("v1");
        let (h3, _r3) = handle("v2");

        registry.attach(h1.clone());
        assert_eq!(registry.snapshot(), counts(1, 1));
        registry.attach(h2.clone());
        assert_eq!(registry.snapshot(), counts(2, 1));
        registry.attach(h3.clone());
        assert_eq!(registry.snapshot(), counts(3, 2));

        assert!(registry.detach(&h1));
        assert_eq!(registry.snapshot(), counts(2, 2));
        assert!(registry.detach(&h2));
        assert_eq!(registry.snapshot(), counts(1, 1));
        assert_eq!(registry.visitor_connections("v1"), 0);
        assert!(registry.detach(&h3));
        assert_eq!(registry.snapshot(), counts(0, 0));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_many_handles_for_one_visitor_count_once_as_unique() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (h, rx) = handle("same-visitor");
            receivers.push(rx);
            registry.attach(h);
        }

        assert_eq!(registry.snapshot(), counts(5, 1));
        assert_eq!(registry.visitor_connections("same-visitor"), 5);
    }

    #[test]
    fn test_double_detach_decrements_once() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = handle("v1");
        let (h2, _r2) = handle("v1");
        registry.attach(h1.clone());
        registry.attach(h2.clone());

        assert!(registry.detach(&h1));
        assert!(!registry.detach(&h1));
        assert_eq!(registry.snapshot(), counts(1, 1));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_detach_unknown_handle_is_noop() {
        let registry = ConnectionRegistry::new();
        let (known, _r1) = handle("v1");
        let (stranger, _r2) = handle("v1");
        registry.attach(known);

        assert!(!registry.detach(&stranger));
        assert_eq!(registry.snapshot(), counts(1, 1));
    }

    #[test]
    fn test_reattaching_same_handle_is_not_double_counted() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = handle("v1");
        registry.attach(h1.clone());
        registry.attach(h1);

        assert_eq!(registry.snapshot(), counts(1, 1));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_for_each_handle_can_detach_reentrantly() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = handle("v1");
        let (h2, _r2) = handle("v2");
        registry.attach(h1);
        registry.attach(h2);

        let mut visited = 0;
        registry.for_each_handle(|h| {
            visited += 1;
            registry.detach(h);
        });

        assert_eq!(visited, 2);
        assert_eq!(registry.snapshot(), counts(0, 0));
    }

    #[test]
    fn test_for_each_handle_continues_past_failed_sends() {
        let registry = ConnectionRegistry::new();
        let (dead, dead_rx) = handle("v1");
        let (alive, mut alive_rx) = handle("v2");
        dead.mark_attached();
        alive.mark_attached();
        registry.attach(dead);
        registry.attach(alive);
        drop(dead_rx);

        let mut failures = 0;
        registry.for_each_handle(|h| {
            if h.send("data: x\n\n".to_string()).is_err() {
                failures += 1;
            }
        });

        assert_eq!(failures, 1);
        assert_eq!(alive_rx.try_recv().unwrap(), "data: x\n\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_churn_leaves_registry_empty() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        let mut receivers = Vec::new();
        for visitor in 0..10 {
            for _ in 0..10 {
                let (h, rx) = handle(&format!("visitor-{visitor}"));
                handles.push(h);
                receivers.push(rx);
            }
        }

        let attaches: Vec<_> = handles
            .iter()
            .cloned()
            .map(|h| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.attach(h) })
            })
            .collect();
        for task in attaches {
            task.await.unwrap();
        }
        assert_eq!(registry.snapshot(), counts(100, 10));
        assert!(registry.is_consistent());

        let detaches: Vec<_> = handles
            .into_iter()
            .map(|h| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.detach(&h) })
            })
            .collect();
        for task in detaches {
            assert!(task.await.unwrap());
        }

        assert_eq!(registry.snapshot(), counts(0, 0));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_interleaved_threads_keep_invariants() {
        let registry = Arc::new(ConnectionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let (tx, _rx) = mpsc::unbounded_channel::<String>();
                        let h = Arc::new(ConnectionHandle::new(format!("v{}", (t + i) % 7), tx));
                        registry.attach(h.clone());
                        if i % 3 != 0 {
                            registry.detach(&h);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // 8 threads * ceil(200 / 3) handles left attached
        assert_eq!(registry.snapshot().total_connections, 8 * 67);
        assert!(registry.is_consistent());
    }
}
