//! HTTP and WebSocket surface.

pub mod documents;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();
    Router::new()
        .route("/", get(documents::chat_interface))
        .route("/api/upload/", post(documents::upload_document))
        .route("/api/documents/", get(documents::list_documents))
        .route("/ws/chat/", get(ws::chat_socket))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
