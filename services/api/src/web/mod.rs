pub mod auth;
pub mod middleware;
pub mod pages;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Builds the application router. Exposed from the library so the server
/// binary and the integration tests share one route table.
pub fn app_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required). /api/generate works anonymously but
    // persists to history when a valid session cookie is present.
    let public_routes = Router::new()
        .route("/", get(pages::index))
        .route(
            "/register",
            get(pages::register_page).post(auth::register_handler),
        )
        .route("/login", get(pages::login_page).post(auth::login_handler))
        .route("/editor", get(pages::editor))
        .route("/learning-path", get(pages::learning_path))
        .route("/api/generate", post(rest::generate_handler))
        .route("/api/run", post(rest::run_handler))
        .route("/api/onboard", post(rest::onboard_handler));

    // Protected routes (auth required).
    let protected_routes = Router::new()
        .route("/logout", get(auth::logout_handler))
        .route("/api/history", get(rest::history_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
