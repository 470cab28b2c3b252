//! API Routes
//!
//! Configures the Axum router for the document server.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{document_handler, favicon_handler, AppState};

/// Creates the main router.
///
/// # Endpoints
/// - `GET /favicon.ico` - Always 204, never rendered
/// - any other path - Markdown document, see [`document_handler`]
///
/// # Middleware
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/favicon.ico", get(favicon_handler))
        .fallback(document_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
