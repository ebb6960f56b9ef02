use crate::error::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Comment line sent as the keep-alive frame. Standard event-stream parsers
/// ignore comment lines, so it never surfaces as a message on the client.
const HEARTBEAT_COMMENT: &str = "heartbeat";

/// Raw connection counts as read from the registry under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub total_connections: usize,
    pub unique_visitors: usize,
}

/// Immutable point-in-time view of the registry sent to every client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub total_connections: usize,
    pub unique_visitors: usize,
    #[serde(serialize_with = "serialize_iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(counts: Counts, timestamp: DateTime<Utc>) -> Self {
        Self {
            total_connections: counts.total_connections,
            unique_visitors: counts.unique_visitors,
            timestamp,
        }
    }

    /// Stamp `counts` with the current UTC time.
    pub fn now(counts: Counts) -> Self {
        Self::new(counts, Utc::now())
    }

    pub fn counts(&self) -> Counts {
        Counts {
            total_connections: self.total_connections,
            unique_visitors: self.unique_visitors,
        }
    }
}

// ISO-8601 in UTC with millisecond precision and a trailing `Z`,
// e.g. `2024-05-01T12:00:00.000Z`.
fn serialize_iso8601<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// A single unit pushed down one client's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `data: <snapshot json>\n\n`
    Snapshot(Snapshot),
    /// `: heartbeat\n\n`
    Heartbeat,
}

impl Frame {
    /// Encode into the exact bytes written on the wire.
    pub fn encode(&self) -> Result<String, Error> {
        match self {
            Frame::Snapshot(snapshot) => {
                let json = serde_json::to_string(snapshot)?;
                Ok(format!("data: {json}\n\n"))
            }
            Frame::Heartbeat => Ok(format!(": {HEARTBEAT_COMMENT}\n\n")),
        }
    }
}
