//! Shared test harness: a mock identity provider plus freshly minted RSA
//! signing keys for producing real, verifiable identity tokens.

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authgate::ClientConfig;

/// Redirect URI registered for the test client.
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

/// An RSA signing key minted for tests, with its public JWK form.
pub struct TestKey {
    pub kid: String,
    encoding_key: EncodingKey,
    jwk: Value,
}

impl TestKey {
    /// Generate a fresh 2048-bit RSA key published under `kid`.
    pub fn generate(kid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA key");
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("failed to encode private key");
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("invalid RSA PEM");

        let jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        });

        Self {
            kid: kid.to_owned(),
            encoding_key,
            jwk,
        }
    }

    /// Public JWK form, as published by the JWKS endpoint.
    pub fn jwk(&self) -> Value {
        self.jwk.clone()
    }

    /// Sign `claims` as a compact RS256 JWT carrying this key's id.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).expect("failed to sign test token")
    }

    /// Sign `claims` without a `kid` in the header.
    pub fn sign_without_kid(&self, claims: &Value) -> String {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .expect("failed to sign test token")
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

/// Flip bits in the signature segment, keeping the token structurally
/// valid (canonical base64url) but cryptographically broken. The first
/// character is altered: unlike the last one, its bits are always
/// significant, so the segment still decodes.
pub fn tamper_signature(token: &str) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    assert_eq!(parts.len(), 3, "compact JWT must have three segments");

    let mut chars: Vec<char> = parts[2].chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    parts[2] = chars.into_iter().collect();
    parts.join(".")
}

/// A wiremock-backed identity provider with token and JWKS endpoints.
pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The issuer string minted into test tokens.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.server.uri())
    }

    pub fn jwks_endpoint(&self) -> String {
        format!("{}/jwks", self.server.uri())
    }

    /// Configuration for the registered test client, pointing at this
    /// provider.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(
            "test-client",
            "test-secret",
            self.token_endpoint(),
            self.jwks_endpoint(),
            self.issuer(),
            REDIRECT_URI,
        )
    }

    /// Claims that pass every check against [`MockIdp::client_config`].
    pub fn standard_claims(&self, sub: &str) -> Value {
        let now = unix_now();
        json!({
            "sub": sub,
            "iss": self.issuer(),
            "aud": "test-client",
            "exp": now + 300,
            "iat": now,
        })
    }

    /// Serve these keys from the JWKS endpoint for all requests.
    pub async fn mock_jwks(&self, keys: &[&TestKey]) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serve these keys for exactly one request; later-mounted mocks take
    /// over afterwards.
    pub async fn mock_jwks_once(&self, keys: &[&TestKey]) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(keys)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Serve these keys with an artificial response delay.
    pub async fn mock_jwks_delayed(&self, keys: &[&TestKey], delay: std::time::Duration) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_body(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail JWKS fetches with `status`.
    pub async fn mock_jwks_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer token grants with `body`.
    pub async fn mock_token_success(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Reject token grants with an OAuth2 error document.
    pub async fn mock_token_error(&self, status: u16, error: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "error": error })))
            .mount(&self.server)
            .await;
    }

    /// How many JWKS fetches the provider has served.
    pub async fn jwks_fetches(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|request| request.url.path() == "/jwks")
                    .count()
            })
            .unwrap_or(0)
    }
}

fn jwks_body(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}
