use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

// Opaque visitor identifier handed to us by the identity layer
pub type VisitorId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Send side of a push transport to exactly one client.
///
/// The registry only ever needs to push already-encoded frames and to learn
/// when the client went away, so any transport that can do both can carry the
/// count stream.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Push one encoded frame. Fails once the client is gone.
    fn send(&self, frame: String) -> Result<(), Error>;

    /// Resolves when the client end of the transport has been dropped.
    async fn closed(&self);
}

#[async_trait]
impl FrameSink for UnboundedSender<String> {
    fn send(&self, frame: String) -> Result<(), Error> {
        UnboundedSender::send(self, frame)?;
        Ok(())
    }

    async fn closed(&self) {
        UnboundedSender::closed(self).await
    }
}

/// Per-connection lifecycle state. `Detached` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Attached = 1,
    Detached = 2,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Attached,
            _ => ConnectionState::Detached,
        }
    }
}

/// One live push channel to one client.
pub struct ConnectionHandle {
    id: ConnectionId,
    visitor_id: VisitorId,
    sink: Box<dyn FrameSink>,
    created_at: DateTime<Utc>,
    state: AtomicU8,
    detached: Notify,
}

impl ConnectionHandle {
    pub fn new(visitor_id: VisitorId, sink: impl FrameSink + 'static) -> Self {
        Self {
            id: ConnectionId::new(),
            visitor_id,
            sink: Box::new(sink),
            created_at: Utc::now(),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            detached: Notify::new(),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn visitor_id(&self) -> &VisitorId {
        &self.visitor_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::Acquire))
    }

    /// Push an encoded frame to the client. A detached handle never sends.
    pub fn send(&self, frame: String) -> Result<(), Error> {
        if self.state() == ConnectionState::Detached {
            return Err(Error::transport_closed());
        }
        self.sink.send(frame)
    }

    /// Waits for the transport to report that the client went away.
    pub async fn closed(&self) {
        self.sink.closed().await
    }

    /// Resolves once the handle has been moved to `Detached`, whoever did it.
    /// Meant for the single supervisor of this connection.
    pub async fn detached(&self) {
        if self.state() == ConnectionState::Detached {
            return;
        }
        self.detached.notified().await
    }

    /// `Connecting -> Attached`. Returns false if the handle already left
    /// `Connecting`.
    pub(crate) fn mark_attached(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Attached as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// One-shot transition into `Detached`. Only the first caller gets `true`
    /// and is responsible for tearing the connection down.
    pub(crate) fn begin_detach(&self) -> bool {
        let previous = self
            .state
            .swap(ConnectionState::Detached as u8, Ordering::AcqRel);
        let first = ConnectionState::from(previous) != ConnectionState::Detached;
        if first {
            // Stores a permit if the supervisor is not waiting yet.
            self.detached.notify_one();
        }
        first
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("visitor_id", &self.visitor_id)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
