//! Cache Entry Module
//!
//! Defines the canonical cache key and the immutable rendered-page entry.

use std::fmt;

use axum::body::Bytes;
use chrono::{DateTime, Duration, Utc};

// == Cache Key ==
/// A normalized, root-relative request path.
///
/// Always begins with `/`, carries no `.` or `..` segments and no trailing
/// slash (except for the root key). Only the resolver constructs these from
/// request input; [`CacheKey::new`] re-checks the shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps a path that already satisfies the key invariant.
    ///
    /// Returns `None` if the path is not in canonical form.
    pub fn new(path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        if is_canonical_key(&path) {
            Some(Self(path))
        } else {
            None
        }
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the page's filename token.
    pub fn file_stem(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_canonical_key(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && rest
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

// == Cache Entry ==
/// A rendered page plus its expiry timestamp.
///
/// Entries are never mutated once stored; replacing a key stores a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The rendered response body
    pub content: Bytes,
    /// Point in time after which the entry is stale (ignored in indefinite mode)
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` from now.
    ///
    /// A non-positive TTL still records an expiry (now or in the past); the
    /// store decides whether expiry applies. TTLs beyond chrono's range
    /// saturate at the latest representable instant.
    pub fn new(content: impl Into<Bytes>, ttl_seconds: i64) -> Self {
        Self::with_expiry(content, expiry_after(Utc::now(), ttl_seconds))
    }

    /// Creates an entry with an explicit expiry timestamp.
    pub fn with_expiry(content: impl Into<Bytes>, expires_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            expires_at,
        }
    }

    // == Is Expired ==
    /// True once `now` has reached the expiry timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry_after(now: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(if ttl_seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}
