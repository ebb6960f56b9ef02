use crate::{
    controller::{health_check_controller, status_controller, visitor_controller},
    middleware::{cookie_layer, cors_layer},
    sse, AppState,
};
use axum::{routing::get, Router};

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(health_routes())
        .merge(status_routes(app_state.clone()))
        .merge(visitor_routes(app_state.clone()))
        .merge(sse_routes(app_state))
        .layer(cookie_layer())
        .layer(cors)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn status_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_controller::read))
        .with_state(app_state)
}

fn visitor_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/visitor", get(visitor_controller::read))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse::handler::sse_handler))
        .with_state(app_state)
}
