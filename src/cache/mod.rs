//! Cache Module
//!
//! In-memory page cache with TTL expiry, a capacity bound and whole-store
//! invalidation.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, CacheKey};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::CacheStore;

// == Public Constants ==
/// `Cache-Control` max-age advertised when the server cache never expires (1 day)
pub const INDEFINITE_MAX_AGE_SECS: i64 = 86_400;
