//! API Handlers
//!
//! Document serving: resolve, serve from cache, or render and store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::info;

use crate::cache::{CacheKey, CacheStore, INDEFINITE_MAX_AGE_SECS};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::render::{Layout, PageRenderer};
use crate::resolver::{PathResolver, Resolution, ResolveError};

/// Response header reporting whether the page came from the cache
pub const X_CACHE: &str = "x-cache";

/// Bytes escaped when a decoded path is written back into `Location`
const LOCATION_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Application state shared across all handlers.
///
/// The cache store is created once and handed to the handler and both
/// background tasks; nothing reaches it through a global.
#[derive(Clone)]
pub struct AppState {
    /// Shared page cache
    pub store: Arc<CacheStore>,
    /// Request path to document mapping
    pub resolver: Arc<PathResolver>,
    /// Markdown and layout rendering
    pub renderer: Arc<PageRenderer>,
}

impl AppState {
    /// Creates a new AppState from its parts.
    pub fn new(store: Arc<CacheStore>, resolver: PathResolver, renderer: PageRenderer) -> Self {
        Self {
            store,
            resolver: Arc::new(resolver),
            renderer: Arc::new(renderer),
        }
    }

    /// Creates a new AppState from (normalized) configuration.
    pub fn from_config(config: &Config, layout: Layout) -> Self {
        let store = Arc::new(CacheStore::new(config.max_entries(), config.ttl_seconds()));
        let resolver = PathResolver::new(
            config.html.markdown_root_dir.clone(),
            config.html.strict_html_url,
        );
        let renderer = PageRenderer::with_layout(config.site_settings(), layout);
        Self::new(store, resolver, renderer)
    }

    /// `Cache-Control` value advertised to clients.
    pub fn cache_control(&self) -> String {
        let max_age = if self.store.is_indefinite() {
            INDEFINITE_MAX_AGE_SECS
        } else {
            self.store.ttl_seconds()
        };
        format!("max-age={max_age}")
    }
}

#[derive(Debug, Clone, Copy)]
enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn as_header(self) -> HeaderValue {
        match self {
            CacheStatus::Hit => HeaderValue::from_static("HIT"),
            CacheStatus::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

/// Handler for every path not claimed by another route.
///
/// Accepts GET and HEAD. The path is percent-decoded before resolution;
/// paths that do not decode to UTF-8 without NUL bytes are not found.
pub async fn document_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    remote: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
        )
            .into_response());
    }

    let decoded = match percent_decode_str(uri.path()).decode_utf8() {
        Ok(path) if !path.contains('\0') => path,
        _ => return Err(AppError::NotFound(uri.path().to_string())),
    };
    let raw_path: &str = &decoded;

    let document = match state.resolver.resolve(raw_path) {
        Ok(Resolution::Redirect(location)) => return Ok(permanent_redirect(&location)),
        Ok(Resolution::Document(document)) => document,
        Err(ResolveError::Traversal(target)) => {
            return Err(traversal_rejected(raw_path, target, remote.map(|ConnectInfo(addr)| addr)))
        }
        Err(ResolveError::NotFound(path)) => return Err(AppError::NotFound(path)),
        Err(err @ ResolveError::Internal { .. }) => {
            return Err(AppError::internal("Internal Server Error", err))
        }
    };

    let cache_control = state.cache_control();

    if let Some(entry) = state.store.get(&document.key).await {
        if state.store.is_valid(&entry) {
            state.store.stats().record_hit();
            return Ok(page_response(entry.content, CacheStatus::Hit, &cache_control));
        }
    }
    state.store.stats().record_miss();

    let source = match tokio::fs::read(&document.source_path).await {
        Ok(source) => source,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(document.key.to_string()))
        }
        Err(err) => return Err(AppError::internal("Internal Server Error", err)),
    };

    let page = render_blocking(&state, document.key.clone(), source).await?;
    state.store.put(document.key, page.clone()).await;

    Ok(page_response(page, CacheStatus::Miss, &cache_control))
}

/// Logs a request whose document would lie outside the content root and
/// answers it like any missing document.
fn traversal_rejected(raw_path: &str, target: String, remote: Option<SocketAddr>) -> AppError {
    let remote_addr = remote
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!(path = raw_path, %remote_addr, "Attack attempt detected");
    AppError::NotFound(target)
}

/// Renders on the blocking pool so Markdown parsing never stalls the runtime.
async fn render_blocking(state: &AppState, key: CacheKey, source: Vec<u8>) -> Result<Bytes> {
    let renderer = state.renderer.clone();
    let rendered = tokio::task::spawn_blocking(move || renderer.render_page(&key, &source))
        .await
        .map_err(|err| AppError::internal("Internal Server Error", err))??;
    Ok(Bytes::from(rendered))
}

fn page_response(body: Bytes, status: CacheStatus, cache_control: &str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(X_CACHE, status.as_header());
    if let Ok(value) = HeaderValue::from_str(cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    response
}

fn permanent_redirect(location: &str) -> Response {
    let encoded = utf8_percent_encode(location, LOCATION_ESCAPES).to_string();
    match HeaderValue::from_str(&encoded) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(err) => AppError::internal("Internal Server Error", err).into_response(),
    }
}

/// Handler for GET /favicon.ico
pub async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}
