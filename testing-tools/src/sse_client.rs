use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub total_connections: usize,
    pub unique_visitors: usize,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub counts: Counts,
    pub timestamp: String,
}

#[derive(Deserialize)]
struct SnapshotPayload {
    #[serde(flatten)]
    counts: Counts,
    timestamp: String,
}

/// One open count stream, standing in for one browser tab.
pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, cookie: Option<&str>, label: String) -> Result<Self> {
        let url = format!("{}/sse", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut builder = es::ClientBuilder::for_url(&url)?;
        if let Some(cookie) = cookie {
            builder = builder.header("Cookie", cookie)?;
        }
        let client = builder.build();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        match serde_json::from_str::<SnapshotPayload>(&event.data) {
                            Ok(payload) => {
                                let event = Event {
                                    counts: payload.counts,
                                    timestamp: payload.timestamp,
                                };
                                if tx.send(event).is_err() {
                                    debug!("Count receiver dropped for {}", task_label);
                                    break;
                                }
                            }
                            Err(e) => warn!("Unparseable frame for {}: {}", task_label, e),
                        }
                    }
                    Some(Ok(es::SSE::Comment(comment))) => {
                        trace!("Keep-alive for {}: {}", task_label, comment);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", task_label, e);
                    }
                    None => {
                        debug!("SSE stream ended for {}", task_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            handle,
        })
    }

    /// Wait for the next snapshot whose counts satisfy `predicate`.
    pub async fn wait_for_counts<F>(&mut self, predicate: F, timeout: Duration) -> Result<Event>
    where
        F: Fn(&Counts) -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for matching counts on {}", self.label);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if predicate(&event.counts) => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    // Superseded snapshot, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed for {}", self.label);
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for matching counts on {}", self.label);
                }
            }
        }
    }

    /// Drop the underlying HTTP stream, as closing a tab would.
    pub fn close(self) {
        self.handle.abort();
    }
}
