//! URL Listing
//!
//! Enumerates the URLs under which every Markdown source can be fetched.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::Config;
use crate::resolver::{DEFAULT_DOCUMENT, DOCUMENT_SUFFIX, SOURCE_EXTENSION};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("markdown root directory does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("markdown root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("accessing markdown root directory: {0}")]
    Access(#[source] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Lists one URL per source document, sorted.
///
/// Without strict URLs, `index` documents are listed by their directory
/// (`/`, `/sub/`) and no suffix is added; with strict URLs every entry ends
/// in `.html`.
pub fn list_urls(config: &Config) -> Result<Vec<String>, ListError> {
    let root = &config.html.markdown_root_dir;
    check_root(root)?;

    let host = match config.general.listen_addr.as_str() {
        "" | "0.0.0.0" => "127.0.0.1",
        other => other,
    };
    let base_url = format!("http://{}:{}", host, config.general.listen_port);
    let strict = config.html.strict_html_url;

    let mut urls = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_dir() || !has_source_extension(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        urls.push(document_url(&base_url, relative, strict));
    }

    urls.sort();
    Ok(urls)
}

fn check_root(root: &Path) -> Result<(), ListError> {
    match root.metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ListError::NotADirectory(root.to_path_buf())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ListError::MissingRoot(root.to_path_buf()))
        }
        Err(err) => Err(ListError::Access(err)),
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

fn document_url(base_url: &str, relative: &Path, strict: bool) -> String {
    let mut url_path = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if !strict {
        if url_path == DEFAULT_DOCUMENT {
            url_path.clear();
        } else if let Some(dir) = url_path.strip_suffix(&format!("/{DEFAULT_DOCUMENT}")) {
            url_path = format!("{dir}/");
        }
    }

    if url_path.is_empty() {
        return format!("{base_url}/");
    }
    if strict {
        format!("{base_url}/{url_path}{DOCUMENT_SUFFIX}")
    } else {
        format!("{base_url}/{url_path}")
    }
}
