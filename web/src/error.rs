use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

/// Errors that can stop a request before a connection is attached. Nothing
/// here is ever written into an open count stream.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// The cookie layer is missing from the request (router misconfiguration),
    /// so the visitor cannot be identified.
    CookiesUnavailable,
}

impl Error {
    pub(crate) fn cookies_unavailable(reason: &str) -> Self {
        Error {
            source: Some(reason.into()),
            error_kind: WebErrorKind::CookiesUnavailable,
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

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("Failed to resolve visitor identity: {self}");
        match self.error_kind {
            WebErrorKind::CookiesUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}
