//! Error types for the document server
//!
//! Provides unified HTTP-facing error handling using thiserror.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::render::RenderError;

// == App Error Enum ==
/// Errors surfaced to HTTP clients.
///
/// Redirects are not errors; see [`crate::resolver::Resolution`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing document, traversal attempt or strict-suffix mismatch
    #[error("not found: {0}")]
    NotFound(String),

    /// Path computation, rendering or template failure
    #[error("{message}: {detail}")]
    Internal {
        /// Client-facing reason
        message: &'static str,
        /// Logged detail, never sent to clients
        detail: String,
    },
}

impl AppError {
    pub fn internal(message: &'static str, detail: impl ToString) -> Self {
        AppError::Internal {
            message,
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Markdown(_) => AppError::internal("Markdown conversion failed", err),
            RenderError::Template(_) | RenderError::Layout(_) => {
                AppError::internal("Template execution failed", err)
            }
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::NotFound(_) => "404 page not found",
            AppError::Internal { message, detail } => {
                error!(%detail, "{message}");
                *message
            }
        };

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{body}\n"),
        )
            .into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, AppError>;
