//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the capacity bound, indefinite validity and
//! behavior under concurrent access.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;

use crate::cache::{CacheEntry, CacheKey, CacheStore};

// == Test Configuration ==
const TEST_TTL: i64 = 300;

// == Strategies ==
/// Generates canonical cache keys such as `/a1/b_2`
fn key_strategy() -> impl Strategy<Value = CacheKey> {
    prop::collection::vec("[a-z0-9_]{1,8}", 1..4)
        .prop_map(|segments| CacheKey::new(format!("/{}", segments.join("/"))).unwrap())
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put(CacheKey),
    Get(CacheKey),
    Clear,
    Sweep,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        6 => key_strategy().prop_map(CacheOp::Put),
        3 => key_strategy().prop_map(CacheOp::Get),
        1 => Just(CacheOp::Clear),
        1 => Just(CacheOp::Sweep),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Size never exceeds the bound, and a just-inserted key is always present.
    #[test]
    fn prop_capacity_enforcement(
        keys in prop::collection::vec(key_strategy(), 1..200),
        max_entries in 1usize..20,
    ) {
        tokio_test::block_on(async {
            let store = CacheStore::new(max_entries, TEST_TTL);

            for key in keys {
                store.put(key.clone(), "body").await;
                let len = store.len().await;
                prop_assert!(len <= max_entries, "Cache size {} exceeds max {}", len, max_entries);
                prop_assert!(store.contains(&key).await, "Newest key {} missing", key);
            }
            Ok(())
        })?;
    }

    // Any interleaving of operations keeps the bound.
    #[test]
    fn prop_mixed_operations_respect_bound(ops in prop::collection::vec(cache_op_strategy(), 1..100)) {
        tokio_test::block_on(async {
            let max_entries = 8;
            let store = CacheStore::new(max_entries, TEST_TTL);

            for op in ops {
                match op {
                    CacheOp::Put(key) => { store.put(key, "body").await; }
                    CacheOp::Get(key) => { let _ = store.get(&key).await; }
                    CacheOp::Clear => { store.clear().await; }
                    CacheOp::Sweep => { store.sweep(Utc::now()).await; }
                }
                prop_assert!(store.len().await <= max_entries);
            }
            Ok(())
        })?;
    }

    // With TTL <= 0, an entry aged arbitrarily far into the past is still valid.
    #[test]
    fn prop_indefinite_mode_ignores_age(
        key in key_strategy(),
        ttl in -1000i64..=0,
        age_hours in 1i64..100_000,
    ) {
        tokio_test::block_on(async {
            let store = CacheStore::new(10, ttl);
            let aged = CacheEntry::with_expiry("body", Utc::now() - Duration::hours(age_hours));
            store.put_entry(key.clone(), aged).await;

            let entry = store.get(&key).await;
            prop_assert!(entry.is_some());
            prop_assert!(store.is_valid(&entry.unwrap()));
            Ok(())
        })?;
    }
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_keeps_bound() {
    let max_entries = 16;
    let store = Arc::new(CacheStore::new(max_entries, TEST_TTL));

    let mut handles = Vec::new();
    for worker in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                let key = CacheKey::new(format!("/page{}", (worker * 7 + i) % 40)).unwrap();
                match store.get(&key).await {
                    Some(entry) if store.is_valid(&entry) => {}
                    _ => {
                        store.put(key.clone(), format!("{worker}-{i}")).await;
                    }
                }
                if i % 50 == 0 {
                    store.sweep(Utc::now()).await;
                }
                assert!(store.len().await <= max_entries);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(store.len().await <= max_entries);
    assert!(!store.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_put_visible_to_later_get() {
    let store = Arc::new(CacheStore::new(1000, TEST_TTL));

    let mut handles = Vec::new();
    for worker in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let key = CacheKey::new(format!("/worker{worker}")).unwrap();
            store.put(key.clone(), format!("payload-{worker}")).await;
            let entry = store.get(&key).await.expect("own write must be visible");
            assert_eq!(entry.content, format!("payload-{worker}").into_bytes());
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.len().await, 16);
}
