//! Provider signing-key cache (JWKS).
//!
//! Identity providers rotate signing keys without notice, so the cache
//! refreshes on a key-id miss rather than on a timer: an unknown `kid`
//! triggers exactly one fetch of the full JWKS document, the cached set is
//! swapped wholesale, and the lookup is retried once. Concurrent misses
//! for the same endpoint share a single outstanding fetch instead of
//! storming the provider.
//!
//! A failed refresh never evicts previously cached keys: stale-but-valid
//! keys stay usable until a fetch succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use jsonwebtoken::jwk::{JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::KeyError;

/// A provider signing key, ready for signature verification.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// The `kid` this key was published under.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Algorithm declared by the JWK, when present.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Verification key material.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

// DecodingKey holds raw key material and has no Debug of its own.
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

type KeySet = HashMap<String, Arc<SigningKey>>;

/// Cached state for one JWKS endpoint.
struct Slot {
    /// Current snapshot. Replaced wholesale on refresh, never mutated in
    /// place, so concurrent readers never observe a half-updated set.
    keys: RwLock<Arc<KeySet>>,
    /// Serializes refresh fetches for this endpoint.
    refresh: Mutex<()>,
    /// Bumped on every successful swap; lets callers queued on `refresh`
    /// detect a refresh that completed while they waited.
    generation: AtomicU64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            keys: RwLock::new(Arc::new(KeySet::new())),
            refresh: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }
}

impl Slot {
    async fn lookup(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }
}

/// Fetches and caches provider signing keys, one key set per JWKS URI.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct KeySetCache {
    http: reqwest::Client,
    slots: Arc<DashMap<String, Arc<Slot>>>,
}

impl KeySetCache {
    /// Create a cache whose JWKS fetches are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to construct HTTP client"),
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Look up `kid` in the cached key set for `jwks_uri`.
    ///
    /// A miss triggers one refresh fetch of the full document followed by
    /// one retry of the lookup. Waiting out another caller's in-flight
    /// refresh counts as that retry; no second fetch is issued.
    ///
    /// # Errors
    ///
    /// [`KeyError::UnknownKey`] when the key id is absent even after a
    /// refresh; [`KeyError::FetchFailed`] when the document could not be
    /// fetched or parsed (cached keys are retained).
    pub async fn get_key(&self, kid: &str, jwks_uri: &str) -> Result<Arc<SigningKey>, KeyError> {
        let slot = self.slot(jwks_uri);

        // Sample the generation before the lookup: a miss is only
        // actionable if no refresh completed in between.
        let seen = slot.generation.load(Ordering::Acquire);

        if let Some(key) = slot.lookup(kid).await {
            debug!(kid = %kid, jwks_uri = %jwks_uri, "signing key served from cache");
            return Ok(key);
        }

        let _refresh = slot.refresh.lock().await;

        if slot.generation.load(Ordering::Acquire) != seen {
            // Another caller refreshed while we waited on the guard; share
            // its result instead of fetching again.
            return slot.lookup(kid).await.ok_or_else(|| KeyError::UnknownKey {
                kid: kid.to_owned(),
            });
        }

        let fresh = self.fetch_key_set(jwks_uri).await?;
        info!(
            jwks_uri = %jwks_uri,
            key_count = fresh.len(),
            "provider key set refreshed"
        );
        *slot.keys.write().await = Arc::new(fresh);
        slot.generation.fetch_add(1, Ordering::AcqRel);

        slot.lookup(kid).await.ok_or_else(|| {
            warn!(kid = %kid, jwks_uri = %jwks_uri, "key id absent even after refresh");
            KeyError::UnknownKey {
                kid: kid.to_owned(),
            }
        })
    }

    fn slot(&self, jwks_uri: &str) -> Arc<Slot> {
        self.slots
            .entry(jwks_uri.to_owned())
            .or_default()
            .value()
            .clone()
    }

    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySet, KeyError> {
        debug!(jwks_uri = %jwks_uri, "fetching JWKS document");

        let response =
            self.http
                .get(jwks_uri)
                .send()
                .await
                .map_err(|error| KeyError::FetchFailed {
                    reason: error.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(KeyError::FetchFailed {
                reason: format!("JWKS endpoint returned status {}", response.status()),
            });
        }

        let document: JwkSet = response.json().await.map_err(|error| KeyError::FetchFailed {
            reason: format!("invalid JWKS body: {error}"),
        })?;

        let mut keys = KeySet::with_capacity(document.keys.len());
        for jwk in &document.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                warn!(jwks_uri = %jwks_uri, "skipping JWK without a key id");
                continue;
            };
            let decoding_key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(error) => {
                    warn!(
                        jwks_uri = %jwks_uri,
                        kid = %kid,
                        error = %error,
                        "skipping JWK with unusable key material"
                    );
                    continue;
                }
            };
            let algorithm = jwk.common.key_algorithm.and_then(signature_algorithm);
            keys.insert(
                kid.clone(),
                Arc::new(SigningKey {
                    key_id: kid,
                    algorithm,
                    decoding_key,
                }),
            );
        }
        Ok(keys)
    }
}

/// Signature algorithms a JWK can declare; encryption algorithms yield
/// `None` and the key is kept without a declared algorithm.
fn signature_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
