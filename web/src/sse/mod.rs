//! SSE HTTP handler for the web layer.
//!
//! This module is the stream transport adapter: it turns an HTTP request into
//! a channel-backed `text/event-stream` response and hands the sending side to
//! the `presence` crate, which owns registration, broadcast and keep-alive.

pub mod handler;
