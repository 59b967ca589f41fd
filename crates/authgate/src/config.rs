//! Relying-party configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Immutable relying-party configuration, created once at startup from
/// external configuration and never mutated afterwards.
///
/// The client secret is held as a [`SecretString`]: it is zeroized on drop,
/// redacted from `Debug` output, and only serialized through the explicit
/// helper below.
///
/// # Example
///
/// ```rust
/// use authgate::ClientConfig;
///
/// let config = ClientConfig::new(
///     "my-app",
///     "s3cr3t",
///     "https://idp.example.com/protocol/openid-connect/token",
///     "https://idp.example.com/protocol/openid-connect/certs",
///     "https://idp.example.com/realms/main",
///     "https://my-app.example.com/callback",
/// );
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// OAuth2 client identifier registered with the provider.
    pub client_id: String,
    /// Client secret (zeroized on drop).
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub client_secret: SecretString,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// JWKS endpoint URL.
    pub jwks_endpoint: String,
    /// Expected `iss` claim value, compared exactly.
    pub issuer: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Tolerance applied to the `iat` check (default 60 seconds).
    #[serde(default = "default_clock_skew")]
    pub clock_skew: Duration,
    /// Whether the token `aud` must include `client_id` (default true).
    /// Disable only for providers that issue no usable audience.
    #[serde(default = "default_enforce_audience")]
    pub enforce_audience: bool,
    /// Upper bound for each outbound HTTP call (default 10 seconds).
    #[serde(default = "default_http_timeout")]
    pub http_timeout: Duration,
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(60)
}

fn default_enforce_audience() -> bool {
    true
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

impl ClientConfig {
    /// Build a configuration with the default clock skew, audience
    /// enforcement, and HTTP timeout.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_endpoint: impl Into<String>,
        jwks_endpoint: impl Into<String>,
        issuer: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            token_endpoint: token_endpoint.into(),
            jwks_endpoint: jwks_endpoint.into(),
            issuer: issuer.into(),
            redirect_uri: redirect_uri.into(),
            clock_skew: default_clock_skew(),
            enforce_audience: default_enforce_audience(),
            http_timeout: default_http_timeout(),
        }
    }

    /// Validate the configuration. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an identifier is empty, an endpoint is
    /// not a parseable URL, or an endpoint uses plain HTTP on a
    /// non-loopback host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("client_id", &self.client_id)?;
        require_non_empty("issuer", &self.issuer)?;
        check_endpoint("token_endpoint", &self.token_endpoint)?;
        check_endpoint("jwks_endpoint", &self.jwks_endpoint)?;
        check_endpoint("redirect_uri", &self.redirect_uri)?;
        Ok(())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    Ok(())
}

fn check_endpoint(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value).map_err(|error| ConfigError::InvalidUrl {
        field,
        reason: error.to_string(),
    })?;

    match parsed.scheme() {
        "https" => {}
        "http" => {
            // Plain HTTP stays usable for local development against a
            // provider on the same machine; anything else risks leaking
            // codes and tokens in transit.
            let loopback = matches!(
                parsed.host_str(),
                Some("localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]")
            );
            if !loopback {
                return Err(ConfigError::InsecureUrl { field });
            }
        }
        other => {
            return Err(ConfigError::InvalidUrl {
                field,
                reason: format!("unsupported scheme '{other}'"),
            });
        }
    }

    // Fragments are forbidden in redirect URIs by the OAuth2 spec.
    if field == "redirect_uri" && parsed.fragment().is_some() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: "redirect URI must not contain a fragment".to_string(),
        });
    }

    Ok(())
}

// SecretString is deliberately not Serialize; route it through explicit
// helpers so serialization of a config is a conscious choice.
fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::new)
}
