//! Path Resolver
//!
//! Turns a raw request path into either a canonical redirect target or a
//! cache key plus the Markdown source file it maps to.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::cache::CacheKey;

// == Public Constants ==
/// Public suffix of rendered documents
pub const DOCUMENT_SUFFIX: &str = ".html";

/// Extension of source documents on disk
pub const SOURCE_EXTENSION: &str = "md";

/// Document served for directory requests
pub const DEFAULT_DOCUMENT: &str = "index";

// == Resolution ==
/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The request path is not canonical; redirect permanently to this path.
    Redirect(String),
    /// The request path names a document inside the content root.
    Document(ResolvedDocument),
}

/// A validated document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    /// Canonical cache key (e.g. `/sub/deep`)
    pub key: CacheKey,
    /// Absolute path of the Markdown source
    pub source_path: PathBuf,
}

// == Resolve Error ==
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Strict-suffix mismatch or no such document
    #[error("document not found: {0}")]
    NotFound(String),

    /// The resolved location falls outside the content root
    #[error("path escapes content root: {0}")]
    Traversal(String),

    /// Absolute path computation failed
    #[error("cannot resolve path {path}: {source}")]
    Internal {
        path: String,
        #[source]
        source: io::Error,
    },
}

// == Path Resolver ==
/// Maps request paths onto Markdown files below a fixed root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    strict_suffix: bool,
}

impl PathResolver {
    /// Creates a resolver for `root`.
    ///
    /// With `strict_suffix`, only paths ending in `.html` are served.
    pub fn new(root: impl Into<PathBuf>, strict_suffix: bool) -> Self {
        Self {
            root: root.into(),
            strict_suffix,
        }
    }

    // == Resolve ==
    /// Resolves a raw request path.
    ///
    /// Non-canonical paths (dot segments, doubled slashes) always produce a
    /// redirect before any other check, so upstream proxies that matched on
    /// the raw path cannot be bypassed.
    pub fn resolve(&self, raw_path: &str) -> Result<Resolution, ResolveError> {
        let canonical = canonical_request_path(raw_path);
        if canonical != raw_path {
            return Ok(Resolution::Redirect(canonical));
        }

        if self.strict_suffix && !raw_path.ends_with(DOCUMENT_SUFFIX) {
            return Err(ResolveError::NotFound(raw_path.to_string()));
        }

        let key = document_key(raw_path)
            .ok_or_else(|| ResolveError::NotFound(raw_path.to_string()))?;
        let source_path = self.source_path_for(&key)?;

        Ok(Resolution::Document(ResolvedDocument { key, source_path }))
    }

    /// Joins the root with the key, then checks the result stays inside it.
    fn source_path_for(&self, key: &CacheKey) -> Result<PathBuf, ResolveError> {
        let relative = format!("{}.{}", key.as_str().trim_start_matches('/'), SOURCE_EXTENSION);
        let candidate = self.root.join(&relative);

        let abs_root = absolute(&self.root)?;
        let abs_candidate = absolute(&candidate)?;

        match relative_within(&abs_root, &abs_candidate) {
            Some(rel) if !rel.as_os_str().is_empty() => Ok(abs_candidate),
            _ => Err(ResolveError::Traversal(key.to_string())),
        }
    }
}

// == Path Cleaning ==
/// Lexically cleans a URL path.
///
/// Collapses repeated slashes, drops `.` segments and resolves `..` against
/// the preceding segment. Rooted paths never climb above `/`. An empty result
/// is `.` for relative input and `/` for rooted input. The result never has a
/// trailing slash unless it is `/`.
pub fn clean_url_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Cleans a request path, keeping a trailing slash on non-root directories.
pub fn canonical_request_path(raw_path: &str) -> String {
    let mut cleaned = clean_url_path(raw_path);
    if raw_path.ends_with('/') && cleaned != "/" {
        cleaned.push('/');
    }
    cleaned
}

/// Derives the cache key for an already-canonical request path.
fn document_key(canonical_path: &str) -> Option<CacheKey> {
    let mut path = canonical_path.to_string();
    if path.ends_with('/') {
        path.push_str(DEFAULT_DOCUMENT);
    }
    if let Some(stripped) = path.strip_suffix(DOCUMENT_SUFFIX) {
        path.truncate(stripped.len());
    }

    let cleaned = clean_url_path(&path);
    let key = match cleaned.as_str() {
        "." | "/" => format!("/{DEFAULT_DOCUMENT}"),
        other if other.starts_with('/') => other.to_string(),
        other => format!("/{other}"),
    };
    CacheKey::new(key)
}

// == Filesystem Containment ==
fn absolute(path: &Path) -> Result<PathBuf, ResolveError> {
    std::path::absolute(path)
        .map(|abs| normalize_lexically(&abs))
        .map_err(|source| ResolveError::Internal {
            path: path.display().to_string(),
            source,
        })
}

/// Removes `.` and resolves `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Returns `candidate` relative to `root`, or `None` if it lies outside.
///
/// Compares whole components, so `/docs-evil` is not inside `/docs`.
pub fn relative_within(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let rel = candidate.strip_prefix(root).ok()?;
    if rel.components().next() == Some(Component::ParentDir) {
        return None;
    }
    Some(rel.to_path_buf())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver(strict: bool) -> PathResolver {
        PathResolver::new("/srv/docs", strict)
    }

    fn document(resolution: Resolution) -> ResolvedDocument {
        match resolution {
            Resolution::Document(doc) => doc,
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn test_clean_url_path() {
        let cases = [
            ("", "."),
            ("/", "/"),
            ("//", "/"),
            ("/a/b", "/a/b"),
            ("/a//b", "/a/b"),
            ("/a/./b", "/a/b"),
            ("/a/b/..", "/a"),
            ("/a/b/../c", "/a/c"),
            ("/../a", "/a"),
            ("/a/", "/a"),
            ("a/../..", ".."),
            ("a/./b/", "a/b"),
            ("..", ".."),
        ];
        for (input, expected) in cases {
            assert_eq!(clean_url_path(input), expected, "clean({input:?})");
        }
    }

    #[test]
    fn test_canonical_keeps_trailing_slash() {
        assert_eq!(canonical_request_path("/sub/"), "/sub/");
        assert_eq!(canonical_request_path("/sub//"), "/sub/");
        assert_eq!(canonical_request_path("/sub/../"), "/");
        assert_eq!(canonical_request_path("/"), "/");
    }

    #[test]
    fn test_redirects_non_canonical_paths() {
        let cases = [
            ("/t1/t11/../cococo.html", "/t1/cococo.html"),
            ("/sub/../about", "/about"),
            ("/t1/dummy/../cococo", "/t1/cococo"),
            ("/t1//cococo", "/t1/cococo"),
            ("/./about", "/about"),
        ];
        for (input, target) in cases {
            assert_eq!(
                resolver(false).resolve(input).unwrap(),
                Resolution::Redirect(target.to_string()),
                "resolve({input:?})"
            );
        }
    }

    #[test]
    fn test_redirect_happens_before_strict_check() {
        let resolution = resolver(true).resolve("/t1/../about").unwrap();
        assert_eq!(resolution, Resolution::Redirect("/about".to_string()));
    }

    #[test]
    fn test_resolves_documents() {
        let doc = document(resolver(false).resolve("/about").unwrap());
        assert_eq!(doc.key.as_str(), "/about");
        assert_eq!(doc.source_path, PathBuf::from("/srv/docs/about.md"));

        let doc = document(resolver(false).resolve("/sub/deep.html").unwrap());
        assert_eq!(doc.key.as_str(), "/sub/deep");
        assert_eq!(doc.source_path, PathBuf::from("/srv/docs/sub/deep.md"));
    }

    #[test]
    fn test_directory_requests_use_index() {
        let doc = document(resolver(false).resolve("/").unwrap());
        assert_eq!(doc.key.as_str(), "/index");
        assert_eq!(doc.source_path, PathBuf::from("/srv/docs/index.md"));

        let doc = document(resolver(false).resolve("/sub/").unwrap());
        assert_eq!(doc.key.as_str(), "/sub/index");
    }

    #[test]
    fn test_bare_suffix_maps_to_index() {
        let doc = document(resolver(false).resolve("/.html").unwrap());
        assert_eq!(doc.key.as_str(), "/index");
    }

    #[test]
    fn test_strict_mode_requires_suffix() {
        assert!(matches!(
            resolver(true).resolve("/about"),
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            resolver(true).resolve("/"),
            Err(ResolveError::NotFound(_))
        ));

        let doc = document(resolver(true).resolve("/about.html").unwrap());
        assert_eq!(doc.key.as_str(), "/about");
        let doc = document(resolver(true).resolve("/index.html").unwrap());
        assert_eq!(doc.key.as_str(), "/index");
    }

    #[test]
    fn test_html_and_plain_share_key() {
        let plain = document(resolver(false).resolve("/about").unwrap());
        let suffixed = document(resolver(false).resolve("/about.html").unwrap());
        assert_eq!(plain.key, suffixed.key);
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let doc = document(PathResolver::new("docs/../docs", false).resolve("/a").unwrap());
        assert!(doc.source_path.is_absolute());
        assert!(doc.source_path.ends_with("docs/a.md"));
    }

    #[test]
    fn test_relative_within_component_wise() {
        let root = Path::new("/docs");
        assert_eq!(
            relative_within(root, Path::new("/docs/a.md")),
            Some(PathBuf::from("a.md"))
        );
        assert_eq!(relative_within(root, Path::new("/docs-evil/a.md")), None);
        assert_eq!(relative_within(root, Path::new("/etc/passwd")), None);
        assert_eq!(relative_within(root, Path::new("/docs")), Some(PathBuf::new()));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/srv/docs/../docs/./a.md")),
            PathBuf::from("/srv/docs/a.md")
        );
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
    }

    fn raw_path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                3 => "[a-z0-9]{1,6}",
                1 => Just(String::new()),
                1 => Just(".".to_string()),
                1 => Just("..".to_string()),
                1 => "[a-z]{1,4}\\.html",
            ],
            0..8,
        )
        .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        // Canonicalizing twice changes nothing.
        #[test]
        fn prop_canonicalization_is_idempotent(raw in raw_path_strategy()) {
            let once = canonical_request_path(&raw);
            prop_assert_eq!(canonical_request_path(&once), once);
        }

        // Redirect targets carry no traversal or doubled separators, and
        // resolving them never redirects again.
        #[test]
        fn prop_redirect_target_is_canonical(raw in raw_path_strategy()) {
            let resolver = PathResolver::new("/srv/docs", false);
            if let Resolution::Redirect(target) = resolver.resolve(&raw).unwrap() {
                prop_assert!(!target.contains("//"));
                prop_assert!(!target.split('/').any(|s| s == ".." || s == "."));
                let again = resolver.resolve(&target).unwrap();
                prop_assert!(!matches!(again, Resolution::Redirect(_)), "redirect loop on {}", target);
            }
        }

        // Every served document lives under the root.
        #[test]
        fn prop_documents_stay_inside_root(raw in raw_path_strategy()) {
            let resolver = PathResolver::new("/srv/docs", false);
            if let Ok(Resolution::Document(doc)) = resolver.resolve(&raw) {
                prop_assert!(doc.source_path.starts_with("/srv/docs"));
                prop_assert!(relative_within(Path::new("/srv/docs"), &doc.source_path).is_some());
            }
        }
    }
}
