//! Error types for the `presence` core.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised inside the presence core. None of these ever reach a
/// connected client: send failures end the one connection that produced them
/// and serialization failures skip a single broadcast.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The client behind a connection handle is gone.
    Transport,
    /// A snapshot could not be encoded into a frame.
    Serialization,
}

impl Error {
    pub fn transport_closed() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Transport,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error_kind {
            ErrorKind::Transport => write!(f, "Presence Error: client transport closed"),
            ErrorKind::Serialization => write!(f, "Presence Error: failed to encode frame"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        // The unsent payload is dropped here; only the fact that the receiver
        // is gone matters to callers.
        Error::transport_closed()
    }
}
