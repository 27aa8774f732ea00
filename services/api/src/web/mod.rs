pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::{AppState, CurrentUser};

/// Builds the API router: `/health` is public, everything under
/// `/api/v1/interviews` requires a bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    let interview_routes = Router::new()
        .route(
            "/",
            post(rest::create_interview_handler).get(rest::list_interviews_handler),
        )
        .route(
            "/{id}",
            get(rest::get_interview_handler).delete(rest::delete_interview_handler),
        )
        .route("/{id}/message", post(rest::submit_answer_handler))
        .route("/{id}/voice", post(rest::submit_voice_handler))
        .route("/{id}/end", post(rest::end_interview_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(rest::health_handler))
        .nest("/api/v1/interviews", interview_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
}
