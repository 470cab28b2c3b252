//! docserve - Markdown documents over HTTP
//!
//! Renders a Markdown file on first request and serves later requests from a
//! bounded in-memory cache until the file changes or the TTL elapses.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod resolver;
pub mod tasks;
pub mod urls;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::{join_within, spawn_invalidator, spawn_reaper};
