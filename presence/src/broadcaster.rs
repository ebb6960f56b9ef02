use crate::connection::ConnectionHandle;
use crate::message::{Frame, Snapshot};
use crate::registry::ConnectionRegistry;
use log::*;
use std::sync::Arc;

/// Pushes the registry's current counts to every registered handle.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Read the counts, stamp them and fan the encoded frame out.
    ///
    /// Failed pushes are not retried. The handles whose client is gone are
    /// returned so the caller can detach them.
    pub fn broadcast_current_state(&self) -> Vec<Arc<ConnectionHandle>> {
        let snapshot = Snapshot::now(self.registry.snapshot());

        let frame = match Frame::Snapshot(snapshot.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize snapshot: {e}");
                return Vec::new();
            }
        };

        let mut delivered = 0usize;
        let mut dead = Vec::new();
        self.registry.for_each_handle(|handle| {
            match handle.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to send snapshot to connection {}: {}. Connection will be cleaned up.",
                        handle.id(),
                        e
                    );
                    dead.push(handle.clone());
                }
            }
        });

        debug!(
            "Broadcast total={} unique={} to {} connection(s), {} failed",
            snapshot.total_connections,
            snapshot.unique_visitors,
            delivered,
            dead.len()
        );

        dead
    }
}
