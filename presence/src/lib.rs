//! Live presence counting for streaming clients.
//!
//! This crate tracks every open event-stream connection, grouped by the
//! visitor that opened it, and pushes the live counts to all of them whenever
//! the set of connections changes.
//!
//! # Architecture
//!
//! - **Registry**: visitor id -> set of connection handles, plus a total
//!   connection counter, all behind one lock. Unique visitors are derived from
//!   the number of keys and never stored.
//! - **Broadcaster**: builds one [`message::Snapshot`] per state change and
//!   fans it out to every registered handle.
//! - **Manager**: the connection lifecycle. `attach` registers and broadcasts,
//!   `detach` unregisters once and broadcasts.
//! - **Lifecycle supervisor**: one task per connection sending keep-alive
//!   frames and watching for the client going away.
//! - **Transport-agnostic handles**: connections are reached through the
//!   [`connection::FrameSink`] trait, so the core does not depend on any
//!   particular HTTP stack.
//!
//! # Connection Flow
//!
//! 1. The web layer resolves the visitor id for an inbound request
//! 2. `Manager::attach` wraps the transport sender in a `ConnectionHandle`,
//!    registers it and broadcasts the new counts (the new client included)
//! 3. `lifecycle::spawn` supervises the connection:
//!    - every keep-alive interval a `: heartbeat` comment frame is sent
//!    - when the client disconnects the sender's `closed()` resolves
//! 4. `Manager::detach` removes the handle exactly once and broadcasts the
//!    decremented counts to everyone left
//!
//! # Wire Format
//!
//! ```text
//! data: {"totalConnections":3,"uniqueVisitors":2,"timestamp":"2024-05-01T12:30:15.000Z"}
//!
//! : heartbeat
//!
//! ```
//!
//! # Modules
//!
//! - `connection`: `ConnectionHandle`, `ConnectionId`, `FrameSink` and the per-connection state
//! - `registry`: `ConnectionRegistry`, the only shared mutable state
//! - `broadcaster`: snapshot fan-out
//! - `manager`: attach/detach orchestration
//! - `lifecycle`: keep-alive and close supervision
//! - `message`: `Snapshot`, `Counts` and the `Frame` wire encoding

pub mod broadcaster;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod registry;

pub use manager::Manager;
