//! # authgate - OAuth2/OIDC Relying-Party Authentication
//!
//! An embeddable authentication pipeline for applications that delegate
//! login to an OpenID Connect identity provider: exchange the
//! authorization code returned by the browser redirect for tokens,
//! cryptographically validate the identity token against the provider's
//! rotating public keys, map provider role claims to normalized
//! authorities, and hand the caller an authenticated principal.
//!
//! What this crate deliberately does **not** do: HTTP routing that gets
//! the browser to the provider and back, session/cookie storage, and
//! logout. Those belong to the surrounding application; the
//! [`AuthenticatedPrincipal`] returned here is the seam to them.
//!
//! ## Architecture
//!
//! - [`config`] - [`ClientConfig`], the immutable relying-party settings
//! - [`exchange`] - the authorization-code and refresh-token grants
//! - [`jwt`] - key-set cache, identity-token validator, validated claims
//! - [`authority`] - provider role claims to normalized `ROLE_*` grants
//! - [`authenticator`] - the orchestrator driving one attempt end to end
//! - [`error`] - the failure taxonomy, with transient/terminal
//!   classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authgate::{Authenticator, AuthorizationCode, ClientConfig};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::new(
//!     "my-app",
//!     "s3cr3t",
//!     "https://idp.example.com/protocol/openid-connect/token",
//!     "https://idp.example.com/protocol/openid-connect/certs",
//!     "https://idp.example.com/realms/main",
//!     "https://my-app.example.com/callback",
//! );
//! config.validate()?;
//! let authenticator = Authenticator::new(config);
//!
//! // In the OAuth2 callback handler:
//! let code = AuthorizationCode::new("abc123", "https://my-app.example.com/callback")?;
//! match authenticator.authenticate(&code).await {
//!     Ok(principal) => {
//!         // Hand the principal to the session layer.
//!         assert!(!principal.authorities.is_empty());
//!     }
//!     Err(error) if error.is_transient() => {
//!         // Provider unreachable - offer the user a retry (fresh code).
//!     }
//!     Err(_) => {
//!         // Invalid code or token - do not retry.
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Failure semantics
//!
//! Every failure is terminal for the current attempt; nothing is retried
//! internally. Authorization codes are single-use, so a retry always means
//! restarting the browser flow. `is_transient()` on [`AuthError`] and its
//! parts separates "provider temporarily unreachable" from "credentials or
//! token invalid".

pub mod authenticator;
pub mod authority;
pub mod config;
pub mod error;
pub mod exchange;
pub mod jwt;
pub mod types;

pub use authenticator::Authenticator;
pub use authority::{AuthorityMapper, DEFAULT_AUTHORITY, KeycloakAuthorityMapper};
pub use config::ClientConfig;
pub use error::{AuthError, ConfigError, ExchangeError, KeyError, ValidationError};
pub use exchange::{CodeExchanger, TokenExchanger};
pub use jwt::{DecodedClaims, IdentityTokenValidator, KeySetCache, SigningKey};
pub use types::{AuthenticatedPrincipal, AuthorizationCode, TokenSet};
