//! Identity-token validation.
//!
//! Signature verification happens before any claim is trusted; claim
//! checks then run in a fixed order with one failure kind per check, so a
//! caller can always tell an expired token from a forged one. Apart from
//! the (cached) key lookup, validation is pure CPU work.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, TokenData, Validation, decode, decode_header};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::claims::DecodedClaims;
use super::jwks::KeySetCache;
use crate::config::ClientConfig;
use crate::error::{KeyError, ValidationError};

/// Validates identity tokens against the provider's published signing
/// keys.
pub struct IdentityTokenValidator {
    keys: Arc<KeySetCache>,
    allowed_algorithms: Vec<Algorithm>,
}

impl std::fmt::Debug for IdentityTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityTokenValidator")
            .field("allowed_algorithms", &self.allowed_algorithms)
            .finish_non_exhaustive()
    }
}

impl IdentityTokenValidator {
    /// Create a validator over a shared key cache.
    ///
    /// Default algorithm allowlist: ES256, RS256, PS256.
    pub fn new(keys: Arc<KeySetCache>) -> Self {
        Self {
            keys,
            allowed_algorithms: vec![Algorithm::ES256, Algorithm::RS256, Algorithm::PS256],
        }
    }

    /// Override the algorithm allowlist.
    ///
    /// Only asymmetric algorithms belong here: the key cache carries public
    /// keys, and accepting a symmetric algorithm would let a token be
    /// "verified" against public material.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Validate a compact identity token.
    ///
    /// Checks run in order: structure, algorithm allowlist, key lookup
    /// (refreshing the key set on a `kid` miss), signature, then the
    /// claims: `exp` (strict), `iat` (with clock-skew tolerance), `nbf`
    /// when present, `iss`, and `aud` when enforcement is enabled. The
    /// first failure is terminal; claims are only handed out once every
    /// check passed.
    ///
    /// # Errors
    ///
    /// One [`ValidationError`] kind per failed check.
    pub async fn validate(
        &self,
        id_token: &str,
        config: &ClientConfig,
    ) -> Result<DecodedClaims, ValidationError> {
        let header =
            decode_header(id_token).map_err(|error| ValidationError::malformed(error.to_string()))?;

        if !self.allowed_algorithms.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "identity token algorithm not allowed");
            return Err(ValidationError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header.kid.ok_or(ValidationError::MissingKeyId)?;

        let key = match self.keys.get_key(&kid, &config.jwks_endpoint).await {
            Ok(key) => key,
            Err(KeyError::UnknownKey { kid }) => {
                return Err(ValidationError::UnknownSigningKey { kid });
            }
            Err(error @ KeyError::FetchFailed { .. }) => {
                return Err(ValidationError::KeyLookup(error));
            }
        };

        if let Some(declared) = key.algorithm()
            && declared != header.alg
        {
            warn!(
                kid = %key.key_id(),
                token_alg = ?header.alg,
                key_alg = ?declared,
                "token algorithm differs from the JWK declaration"
            );
        }

        // Signature only here; temporal and audience checks run below so
        // each failure surfaces as its own kind.
        let mut verification = Validation::new(header.alg);
        verification.validate_exp = false;
        verification.validate_nbf = false;
        verification.validate_aud = false;
        verification.required_spec_claims = HashSet::new();

        let token: TokenData<Map<String, Value>> =
            decode(id_token, key.decoding_key(), &verification).map_err(|error| {
                match error.kind() {
                    ErrorKind::InvalidSignature => ValidationError::BadSignature,
                    _ => ValidationError::malformed(error.to_string()),
                }
            })?;

        let claims = token.claims;
        check_claims(&claims, config)?;

        let subject = str_of(&claims, "sub").unwrap_or_default();
        debug!(issuer = %config.issuer, subject = %subject, "identity token validated");
        Ok(DecodedClaims::new(claims))
    }
}

fn check_claims(claims: &Map<String, Value>, config: &ClientConfig) -> Result<(), ValidationError> {
    let now = unix_now();
    let skew = config.clock_skew.as_secs() as i64;

    if str_of(claims, "sub").is_none() {
        return Err(ValidationError::malformed("missing sub claim"));
    }

    let exp = numeric(claims, "exp").ok_or_else(|| ValidationError::malformed("missing exp claim"))?;
    if now >= exp {
        return Err(ValidationError::Expired);
    }

    let iat = numeric(claims, "iat").ok_or_else(|| ValidationError::malformed("missing iat claim"))?;
    if iat > now + skew {
        return Err(ValidationError::IssuedInFuture);
    }

    if let Some(nbf) = numeric(claims, "nbf")
        && now < nbf
    {
        return Err(ValidationError::NotYetValid);
    }

    match str_of(claims, "iss") {
        Some(iss) if iss == config.issuer => {}
        _ => return Err(ValidationError::IssuerMismatch),
    }

    if config.enforce_audience && !audience_contains(claims.get("aud"), &config.client_id) {
        return Err(ValidationError::AudienceMismatch);
    }

    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

fn numeric(claims: &Map<String, Value>, name: &str) -> Option<i64> {
    let value = claims.get(name)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn str_of<'a>(claims: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

/// `aud` may be a single string or a list of strings.
fn audience_contains(aud: Option<&Value>, client_id: &str) -> bool {
    match aud {
        Some(Value::String(audience)) => audience == client_id,
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .any(|audience| audience == client_id),
        _ => false,
    }
}
