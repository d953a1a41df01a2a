use axum::{routing::get, Router};

use crate::{
    handlers::{health_check, method_not_allowed, not_found, readiness_check},
    middleware::apply_middleware,
    state::AppState,
};

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    let router = Router::new()
        .nest("/v1", v1_routes())
        .fallback(not_found)
        .with_state(state);

    apply_middleware(router, &server)
}

fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check).fallback(method_not_allowed))
        .route("/ready", get(readiness_check).fallback(method_not_allowed))
    // posts

    // users

    // auth
}
