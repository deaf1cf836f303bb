//! API routes

pub mod files;
pub mod search;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // File management
        .route(
            "/files",
            post(files::upload_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/files", get(files::list_files))
        .route("/files/*path", delete(files::delete_file))
        // Forced reindex and pending-vector retry
        .route("/index/*path", post(files::reindex_file))
        .route("/retry/*path", post(files::retry_pending))
        // Query
        .route("/search", post(search::search))
        .route("/available-models", get(search::available_models))
}
