pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Resume analysis API
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list)
                .post(handlers::handle_submit)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/resumes/:id", get(handlers::handle_get))
        .route("/api/v1/resumes/:id/status", get(handlers::handle_status))
        .route(
            "/api/v1/resumes/:id/abandon",
            post(handlers::handle_abandon),
        )
        .route(
            "/api/v1/resumes/:id/document",
            get(handlers::handle_document),
        )
        .route("/api/v1/resumes/:id/image", get(handlers::handle_image))
        // Admin
        .route("/api/v1/admin/data", delete(handlers::handle_wipe))
        .with_state(state)
}
