//! End-to-end authentication orchestration.
//!
//! One `authenticate` call drives the whole flow: code exchange, identity-
//! token validation, authority extraction, principal assembly. The steps
//! are strictly sequential, any failure is terminal for the attempt, and
//! nothing is retried internally; the caller decides whether to restart
//! the browser flow (authorization codes are single-use, so a retry always
//! needs a fresh code).

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::authority::{AuthorityMapper, KeycloakAuthorityMapper};
use crate::config::ClientConfig;
use crate::error::{AuthError, ValidationError};
use crate::exchange::{CodeExchanger, TokenExchanger};
use crate::jwt::claims::DecodedClaims;
use crate::jwt::jwks::KeySetCache;
use crate::jwt::validator::IdentityTokenValidator;
use crate::types::{AuthenticatedPrincipal, AuthorizationCode, TokenSet};

/// Drives authorization-code authentication end to end.
///
/// Stateless across invocations: every `authenticate` call is an
/// independent run, and the only state shared between concurrent calls is
/// the thread-safe key cache inside the validator.
///
/// # Example
///
/// ```rust,no_run
/// use authgate::{Authenticator, AuthorizationCode, ClientConfig};
///
/// # tokio_test::block_on(async {
/// let config = ClientConfig::new(
///     "my-app",
///     "s3cr3t",
///     "https://idp.example.com/protocol/openid-connect/token",
///     "https://idp.example.com/protocol/openid-connect/certs",
///     "https://idp.example.com/realms/main",
///     "https://my-app.example.com/callback",
/// );
/// config.validate()?;
///
/// let authenticator = Authenticator::new(config);
/// let code = AuthorizationCode::new("abc123", "https://my-app.example.com/callback")?;
/// let principal = authenticator.authenticate(&code).await?;
/// println!("{} signed in with {:?}", principal.subject, principal.authorities);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct Authenticator {
    config: ClientConfig,
    exchanger: Arc<dyn CodeExchanger>,
    validator: IdentityTokenValidator,
    mapper: Arc<dyn AuthorityMapper>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Wire the default components for `config`: an HTTP exchanger, a
    /// validator over a fresh key cache, and the Keycloak authority
    /// mapper. Both HTTP clients inherit `config.http_timeout`.
    pub fn new(config: ClientConfig) -> Self {
        let keys = Arc::new(KeySetCache::new(config.http_timeout));
        Self {
            exchanger: Arc::new(TokenExchanger::new(config.http_timeout)),
            validator: IdentityTokenValidator::new(keys),
            mapper: Arc::new(KeycloakAuthorityMapper),
            config,
        }
    }

    /// Substitute the exchanger (tests, alternative transports).
    pub fn with_exchanger(mut self, exchanger: Arc<dyn CodeExchanger>) -> Self {
        self.exchanger = exchanger;
        self
    }

    /// Substitute the validator (custom algorithm allowlist, shared key
    /// cache).
    pub fn with_validator(mut self, validator: IdentityTokenValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Substitute the authority mapper for providers with a different
    /// role-claim shape.
    pub fn with_mapper(mut self, mapper: Arc<dyn AuthorityMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// The configuration this authenticator was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authenticate one authorization-code callback.
    ///
    /// # Errors
    ///
    /// [`AuthError`] for the step that failed; `is_transient` on the error
    /// tells whether offering the user a retry makes sense.
    pub async fn authenticate(
        &self,
        code: &AuthorizationCode,
    ) -> Result<AuthenticatedPrincipal, AuthError> {
        debug!(
            stage = "code_received",
            client_id = %self.config.client_id,
            "starting authentication attempt"
        );

        let tokens = self.exchanger.exchange(code, &self.config).await?;
        debug!(
            stage = "exchanged",
            has_refresh_token = tokens.refresh_token.is_some(),
            "authorization code exchanged"
        );

        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or(AuthError::MissingIdentityToken)?;

        let claims = self.validator.validate(id_token, &self.config).await?;
        debug!(stage = "validated", "identity token validated");

        let authorities = self.mapper.authorities(&claims);
        debug!(
            stage = "authorities_extracted",
            authority_count = authorities.len(),
            "authorities extracted"
        );

        let subject = claims
            .subject()
            .map(str::to_owned)
            .ok_or_else(|| AuthError::Validation(ValidationError::malformed("missing sub claim")))?;

        let principal = AuthenticatedPrincipal {
            preferred_username: claims.preferred_username().map(str::to_owned),
            email: claims.email().map(str::to_owned),
            authorities,
            expiry: expiry_for(&tokens, &claims),
            raw_id_token: id_token.to_owned(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            subject,
        };

        info!(
            stage = "authenticated",
            subject = %principal.subject,
            authority_count = principal.authorities.len(),
            "authentication succeeded"
        );
        Ok(principal)
    }
}

/// The provider-reported access-token lifetime wins when present; the
/// identity token's own `exp` is the fallback.
fn expiry_for(tokens: &TokenSet, claims: &DecodedClaims) -> DateTime<Utc> {
    if let Some(seconds) = tokens.expires_in {
        return Utc::now() + chrono::Duration::seconds(seconds as i64);
    }
    claims
        .expires_at()
        .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
        .unwrap_or_else(Utc::now)
}
