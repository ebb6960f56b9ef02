use crate::AppState;
use axum::extract::State;
use axum::Json;
use presence::message::Snapshot;

/// GET the current connection counts.
///
/// Reads the same registry snapshot the broadcaster pushes, for clients that
/// poll instead of streaming and for health checks.
pub async fn read(State(app_state): State<AppState>) -> Json<Snapshot> {
    Json(app_state.presence_ref().snapshot())
}
