use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET liveness probe for the HTTP router
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
