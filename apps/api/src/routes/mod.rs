pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::avatar::{handlers as avatar, ws};
use crate::jobs::handlers as jobs;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Job board
        .route("/jobs", get(jobs::handle_list_jobs))
        .route("/jobs/recommendations", get(jobs::handle_recommendations))
        .route("/jobs/:id", get(jobs::handle_get_job))
        // Avatar coach
        .route("/avatar/start", post(avatar::handle_start))
        .route("/avatar/send", post(avatar::handle_send))
        .route("/avatar/end/:session_id", delete(avatar::handle_end))
        .route("/avatar/status/:session_id", get(avatar::handle_status))
        .route("/avatar/token", post(avatar::handle_token))
        .route("/avatar/webhook", post(avatar::handle_webhook))
        .route("/ws/avatar/:session_id", get(ws::handle_avatar_ws));

    let root = Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler));

    // axum refuses to nest at the root, so an empty prefix merges instead.
    let prefix = state.config.api_prefix.clone();
    let router = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(&prefix, api)
    };

    router.with_state(state)
}
