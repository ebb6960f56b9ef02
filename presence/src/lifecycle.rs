//! Per-connection supervision while a connection is `Attached`.
//!
//! Each attached connection gets one task that sleeps until the next
//! keep-alive tick, the transport's close notification or the handle being
//! detached elsewhere. A failed keep-alive and a close both end in the same
//! idempotent detach, after which the task returns and its timer is dropped
//! with it.

use crate::connection::{ConnectionHandle, ConnectionState};
use crate::manager::Manager;
use crate::message::Frame;
use log::*;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Start supervising `handle` on the current tokio runtime.
pub fn spawn(manager: Arc<Manager>, handle: Arc<ConnectionHandle>) -> JoinHandle<()> {
    tokio::spawn(supervise(manager, handle))
}

/// Drive one connection from `Attached` to `Detached`.
pub async fn supervise(manager: Arc<Manager>, handle: Arc<ConnectionHandle>) {
    let period = manager.keep_alive_interval();
    let mut keep_alive = time::interval_at(Instant::now() + period, period);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = handle.closed() => {
                debug!("Client closed connection {}", handle.id());
                break;
            }
            _ = handle.detached() => {
                // Torn down elsewhere, e.g. after a failed broadcast push.
                trace!("Connection {} detached, stopping keep-alive", handle.id());
                break;
            }
            _ = keep_alive.tick() => {
                if handle.state() == ConnectionState::Detached {
                    break;
                }
                let sent = Frame::Heartbeat
                    .encode()
                    .and_then(|frame| handle.send(frame));
                if let Err(e) = sent {
                    warn!("Keep-alive to connection {} failed: {}", handle.id(), e);
                    break;
                }
                trace!("Sent keep-alive to connection {}", handle.id());
            }
        }
    }

    manager.detach(&handle);
}
