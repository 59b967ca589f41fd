//! Key-rotation, refresh-coalescing, and stale-key behavior of the key
//! cache, driven against a mock JWKS endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use authgate::{IdentityTokenValidator, KeyError, KeySetCache, ValidationError};
use common::{MockIdp, TestKey};

#[tokio::test]
async fn rotation_triggers_exactly_one_refresh_fetch() {
    let idp = MockIdp::start().await;
    let key_a = TestKey::generate("key-a");
    let key_b = TestKey::generate("key-b");

    // The provider rotates after the first fetch: key B only appears in
    // later JWKS responses.
    idp.mock_jwks_once(&[&key_a]).await;
    idp.mock_jwks(&[&key_a, &key_b]).await;

    let cache = KeySetCache::new(Duration::from_secs(5));
    let uri = idp.jwks_endpoint();

    // Seed the cache with key A.
    cache.get_key("key-a", &uri).await.expect("key A");
    assert_eq!(idp.jwks_fetches().await, 1);

    // First sighting of key B: one refresh, then success.
    cache.get_key("key-b", &uri).await.expect("key B after rotation");
    assert_eq!(idp.jwks_fetches().await, 2);

    // Second sighting: served from cache, zero additional fetches.
    cache.get_key("key-b", &uri).await.expect("key B cached");
    assert_eq!(idp.jwks_fetches().await, 2);
}

#[tokio::test]
async fn rotated_token_validates_after_a_single_refresh() {
    let idp = MockIdp::start().await;
    let key_a = TestKey::generate("key-a");
    let key_b = TestKey::generate("key-b");

    idp.mock_jwks_once(&[&key_a]).await;
    idp.mock_jwks(&[&key_a, &key_b]).await;

    let validator = IdentityTokenValidator::new(Arc::new(KeySetCache::new(Duration::from_secs(5))));
    let config = idp.client_config();

    validator
        .validate(&key_a.sign(&idp.standard_claims("u1")), &config)
        .await
        .expect("token signed with the seeded key");
    assert_eq!(idp.jwks_fetches().await, 1);

    validator
        .validate(&key_b.sign(&idp.standard_claims("u1")), &config)
        .await
        .expect("token signed with the rotated key");
    assert_eq!(idp.jwks_fetches().await, 2);

    validator
        .validate(&key_b.sign(&idp.standard_claims("u2")), &config)
        .await
        .expect("second token with the rotated key");
    assert_eq!(idp.jwks_fetches().await, 2);
}

#[tokio::test]
async fn concurrent_misses_share_one_outstanding_fetch() {
    let idp = MockIdp::start().await;
    let key = TestKey::generate("key-a");

    // Slow the JWKS response down so every task is already waiting while
    // the first fetch is in flight.
    idp.mock_jwks_delayed(&[&key], Duration::from_millis(200)).await;

    let cache = KeySetCache::new(Duration::from_secs(5));
    let uri = idp.jwks_endpoint();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let uri = uri.clone();
        handles.push(tokio::spawn(
            async move { cache.get_key("key-a", &uri).await },
        ));
    }

    for handle in handles {
        handle
            .await
            .expect("task completed")
            .expect("every lookup succeeds");
    }

    assert_eq!(idp.jwks_fetches().await, 1);
}

#[tokio::test]
async fn failed_refresh_keeps_stale_keys_usable() {
    let idp = MockIdp::start().await;
    let key_a = TestKey::generate("key-a");

    idp.mock_jwks_once(&[&key_a]).await;
    idp.mock_jwks_error(503).await;

    let cache = KeySetCache::new(Duration::from_secs(5));
    let uri = idp.jwks_endpoint();

    cache.get_key("key-a", &uri).await.expect("seed fetch");

    // The endpoint is now failing: unknown keys report the fetch failure...
    let missing = cache.get_key("key-new", &uri).await;
    assert!(matches!(missing, Err(KeyError::FetchFailed { .. })));

    // ...but the previously cached key is still served.
    cache
        .get_key("key-a", &uri)
        .await
        .expect("stale key remains usable");
}

#[tokio::test]
async fn unknown_key_costs_one_fetch_per_lookup() {
    let idp = MockIdp::start().await;
    let key_a = TestKey::generate("key-a");
    idp.mock_jwks(&[&key_a]).await;

    let cache = KeySetCache::new(Duration::from_secs(5));
    let uri = idp.jwks_endpoint();

    let error = cache.get_key("key-ghost", &uri).await.unwrap_err();
    assert!(matches!(error, KeyError::UnknownKey { .. }));
    assert_eq!(idp.jwks_fetches().await, 1);

    // A later lookup for a key the provider still does not publish
    // refreshes again; the provider's JWKS may have caught up meanwhile.
    cache.get_key("key-ghost", &uri).await.unwrap_err();
    assert_eq!(idp.jwks_fetches().await, 2);
}

#[tokio::test]
async fn fetch_failure_surfaces_as_transient_validation_error() {
    let idp = MockIdp::start().await;
    idp.mock_jwks_error(503).await;

    let key = TestKey::generate("key-a");
    let validator = IdentityTokenValidator::new(Arc::new(KeySetCache::new(Duration::from_secs(5))));
    let config = idp.client_config();

    let error = validator
        .validate(&key.sign(&idp.standard_claims("u1")), &config)
        .await
        .unwrap_err();

    assert!(error.is_transient());
    assert!(matches!(error, ValidationError::KeyLookup(_)));
}
