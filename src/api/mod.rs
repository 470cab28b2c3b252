//! API Module
//!
//! HTTP handlers and routing for the document server.
//!
//! # Endpoints
//! - `GET /favicon.ico` - No content
//! - `GET /<path>` - Rendered Markdown document (cached)

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
