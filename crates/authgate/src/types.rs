//! Core data types flowing through the pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;

/// A single-use authorization code together with the redirect URI it was
/// issued against.
///
/// The provider enforces single use; the pipeline only requires the
/// redirect URI here to match the one from the original authorization
/// request, or the provider will reject the exchange.
#[derive(Clone)]
pub struct AuthorizationCode {
    code: String,
    redirect_uri: String,
}

impl AuthorizationCode {
    /// Pair a code with its redirect URI. Rejects an empty code before any
    /// network round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::EmptyCode`] when `code` is empty or
    /// whitespace.
    pub fn new(
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ExchangeError::EmptyCode);
        }
        Ok(Self {
            code,
            redirect_uri: redirect_uri.into(),
        })
    }

    /// The opaque code string.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The redirect URI the code was issued against.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

// The code is a credential; keep it out of debug output.
impl std::fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCode")
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Token-endpoint response, held only transiently while an authentication
/// attempt is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Opaque bearer token for resource access.
    pub access_token: String,
    /// Token type reported by the provider (normally `Bearer`).
    pub token_type: String,
    /// Refresh token, when the provider issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Compact identity token (JWT). Absent for plain OAuth2 providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scopes, parsed from the space-delimited `scope` member.
    #[serde(
        default,
        deserialize_with = "scope_from_wire",
        serialize_with = "scope_to_wire"
    )]
    pub scope: BTreeSet<String>,
}

fn scope_from_wire<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default())
}

fn scope_to_wire<S>(scope: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let joined = scope.iter().cloned().collect::<Vec<_>>().join(" ");
    serializer.serialize_str(&joined)
}

/// The pipeline's terminal artifact: a validated identity plus its
/// normalized grants and tokens. Owned by the caller (typically a session
/// store) once returned.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    /// Stable subject identifier (`sub`).
    pub subject: String,
    /// Human-facing username, when the provider supplies one.
    pub preferred_username: Option<String>,
    /// Email address, when the provider supplies one.
    pub email: Option<String>,
    /// Normalized authority strings (`ROLE_*`), never empty.
    pub authorities: BTreeSet<String>,
    /// The validated identity token in compact form.
    pub raw_id_token: String,
    /// Bearer token for resource access.
    pub access_token: String,
    /// Refresh token, when issued.
    pub refresh_token: Option<String>,
    /// When the access grant expires.
    pub expiry: DateTime<Utc>,
}

impl AuthenticatedPrincipal {
    /// Whether this principal carries the given authority.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

// Token material stays out of debug output.
impl std::fmt::Debug for AuthenticatedPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedPrincipal")
            .field("subject", &self.subject)
            .field("preferred_username", &self.preferred_username)
            .field("email", &self.email)
            .field("authorities", &self.authorities)
            .field("raw_id_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}
