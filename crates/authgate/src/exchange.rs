//! Authorization-code and refresh-token grants against the token endpoint.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ExchangeError;
use crate::types::{AuthorizationCode, TokenSet};

/// Seam over the token-endpoint grants, so tests and alternative
/// transports can stand in for the HTTP implementation.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Exchange an authorization code for a token set.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::ProviderRejected`] on any non-success status
    /// (terminal; codes are single-use), [`ExchangeError::Unreachable`] on
    /// transport failure (retry only with a fresh code).
    async fn exchange(
        &self,
        code: &AuthorizationCode,
        config: &ClientConfig,
    ) -> Result<TokenSet, ExchangeError>;

    /// Trade a refresh token for a fresh token set.
    ///
    /// Providers that rotate refresh tokens return the replacement in the
    /// response; callers must adopt it and discard the old token.
    ///
    /// # Errors
    ///
    /// Same mapping as [`CodeExchanger::exchange`].
    async fn refresh(
        &self,
        refresh_token: &str,
        config: &ClientConfig,
    ) -> Result<TokenSet, ExchangeError>;
}

/// Production exchanger: one form-encoded POST per grant, nothing cached.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
}

impl TokenExchanger {
    /// Create an exchanger whose requests are bounded by `timeout`.
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to construct HTTP client"),
        }
    }

    async fn post_grant(
        &self,
        config: &ClientConfig,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, ExchangeError> {
        let response = self
            .http
            .post(&config.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|error| {
                warn!(endpoint = %config.token_endpoint, error = %error, "token endpoint unreachable");
                ExchangeError::Unreachable {
                    reason: error.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                endpoint = %config.token_endpoint,
                status = status.as_u16(),
                "token request rejected"
            );
            return Err(ExchangeError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        // A success status with an unreadable body is still a provider
        // answer; retrying the same grant cannot help.
        response
            .json::<TokenSet>()
            .await
            .map_err(|error| ExchangeError::ProviderRejected {
                status: status.as_u16(),
                body: format!("malformed token response: {error}"),
            })
    }
}

#[async_trait]
impl CodeExchanger for TokenExchanger {
    async fn exchange(
        &self,
        code: &AuthorizationCode,
        config: &ClientConfig,
    ) -> Result<TokenSet, ExchangeError> {
        debug!(
            endpoint = %config.token_endpoint,
            client_id = %config.client_id,
            "exchanging authorization code"
        );
        self.post_grant(
            config,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.code()),
                ("redirect_uri", code.redirect_uri()),
                ("client_id", &config.client_id),
                ("client_secret", config.client_secret.expose_secret().as_str()),
            ],
        )
        .await
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        config: &ClientConfig,
    ) -> Result<TokenSet, ExchangeError> {
        debug!(
            endpoint = %config.token_endpoint,
            client_id = %config.client_id,
            "refreshing token set"
        );
        self.post_grant(
            config,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &config.client_id),
                ("client_secret", config.client_secret.expose_secret().as_str()),
            ],
        )
        .await
    }
}
