//! Error taxonomy for the authentication pipeline.
//!
//! Every failure kind below is terminal for the current authentication
//! attempt; nothing is retried internally. The `is_transient` helpers
//! separate "the provider is temporarily unreachable, restarting the flow
//! may succeed" from "the credentials or token are invalid, do not retry".
//!
//! Display strings never carry client secrets or raw token bytes, so they
//! are safe to surface to users and logs.

use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Failures of the authorization-code and refresh-token grants.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The authorization code was empty; no request was sent.
    #[error("authorization code must not be empty")]
    EmptyCode,

    /// The provider answered the grant request with a non-success status.
    ///
    /// Authorization codes are single-use, so resubmitting the same code
    /// cannot succeed.
    #[error("identity provider rejected the token request (HTTP {status})")]
    ProviderRejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Response body, kept for diagnostics. Deliberately absent from
        /// the `Display` output.
        body: String,
    },

    /// The token endpoint could not be reached (timeout, connection
    /// refused, DNS failure). Retry only by restarting the flow with a
    /// fresh code.
    #[error("identity provider unreachable: {reason}")]
    Unreachable {
        /// Transport-level failure description.
        reason: String,
    },
}

impl ExchangeError {
    /// Whether restarting the flow with a fresh code may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Failures of provider signing-key lookup.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key id is absent from the provider's key set even after a
    /// refresh fetch.
    #[error("signing key '{kid}' not present in the provider key set")]
    UnknownKey {
        /// The key id the token asked for.
        kid: String,
    },

    /// The JWKS document could not be fetched or parsed. Previously cached
    /// keys stay in use until a refresh succeeds.
    #[error("failed to fetch JWKS document: {reason}")]
    FetchFailed {
        /// Transport or parse failure description.
        reason: String,
    },
}

impl KeyError {
    /// Whether a later attempt against the same endpoint may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}

/// Failures of identity-token validation.
///
/// The validator runs its checks in a fixed order and stops at the first
/// failure, so a caller always learns the earliest reason a token was
/// rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The token is not a structurally valid JWT, or a required claim is
    /// missing or mistyped.
    #[error("identity token is malformed: {reason}")]
    Malformed {
        /// What made the token unreadable.
        reason: String,
    },

    /// The token's signing algorithm is not in the allowlist.
    #[error("token algorithm {0:?} is not allowed")]
    UnsupportedAlgorithm(Algorithm),

    /// The token header carries no `kid`, so no key can be selected.
    #[error("identity token header carries no key id")]
    MissingKeyId,

    /// No signing key matches the token's `kid`, even after refreshing the
    /// provider key set.
    #[error("no signing key matches key id '{kid}'")]
    UnknownSigningKey {
        /// The key id the token asked for.
        kid: String,
    },

    /// The provider key set could not be obtained at all.
    #[error("could not obtain provider signing keys")]
    KeyLookup(#[source] KeyError),

    /// The signature does not verify against the selected key.
    #[error("identity token signature does not verify")]
    BadSignature,

    /// `exp` is in the past.
    #[error("identity token has expired")]
    Expired,

    /// `iat` is in the future beyond the clock-skew tolerance.
    #[error("identity token is issued in the future")]
    IssuedInFuture,

    /// `nbf` has not been reached yet.
    #[error("identity token is not yet valid")]
    NotYetValid,

    /// `iss` differs from the configured issuer.
    #[error("identity token issuer does not match the configured issuer")]
    IssuerMismatch,

    /// `aud` does not include this client.
    #[error("identity token audience does not include this client")]
    AudienceMismatch,
}

impl ValidationError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Whether the same token could validate once the provider key set is
    /// reachable again. Everything except a failed key fetch means the
    /// token itself is unacceptable.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::KeyLookup(_))
    }
}

/// Terminal result of one authentication attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization-code exchange failed.
    #[error("authorization code exchange failed")]
    Exchange(#[from] ExchangeError),

    /// The token response carried no identity token, so no identity can be
    /// established.
    #[error("token response did not include an identity token")]
    MissingIdentityToken,

    /// The identity token was rejected.
    #[error("identity token validation failed")]
    Validation(#[from] ValidationError),
}

impl AuthError {
    /// Whether the user should be offered a retry (restarting the browser
    /// flow) rather than an error about invalid credentials.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Exchange(error) => error.is_transient(),
            Self::Validation(error) => error.is_transient(),
            Self::MissingIdentityToken => false,
        }
    }
}

/// Startup-time configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured endpoint is not a parseable URL.
    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl {
        /// Which configuration field was rejected.
        field: &'static str,
        /// Parser output.
        reason: String,
    },

    /// A configured endpoint uses plain HTTP on a non-loopback host.
    #[error("{field} must use https (plain http is allowed for loopback hosts only)")]
    InsecureUrl {
        /// Which configuration field was rejected.
        field: &'static str,
    },

    /// A required configuration value is empty.
    #[error("{field} must not be empty")]
    MissingField {
        /// Which configuration field was rejected.
        field: &'static str,
    },
}
