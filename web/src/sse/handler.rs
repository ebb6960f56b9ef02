use crate::extractors::visitor::Visitor;
use crate::AppState;
use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::IntoResponse;
use log::*;
use presence::lifecycle;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Tells nginx-style reverse proxies not to buffer the stream.
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// SSE handler that establishes a long-lived count stream for one client.
///
/// The connection is attached (and the current counts broadcast) before the
/// response is returned, so the first frame the client reads is a snapshot
/// that already includes itself. The response body owns the receiving end of
/// the channel: when the client goes away the body is dropped, the handle's
/// sender observes the closure and the lifecycle task detaches it.
pub(crate) async fn sse_handler(
    Visitor(visitor_id): Visitor,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    debug!("Establishing SSE connection for visitor {}", visitor_id);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handle = app_state.presence.attach(visitor_id, tx);
    lifecycle::spawn(app_state.presence.clone(), handle);

    // Frames arrive already encoded; the body just writes them through.
    // The stream ends once every sender is gone, i.e. after detach.
    let stream = stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(frame);
        }
    };

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(stream),
    )
}
