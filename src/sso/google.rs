use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::SsoConfig;
use crate::errors::{AppError, AppResult};

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity established by a verified provider assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
}

/// The two server-to-server calls the SSO flow makes against the provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trades an authorization code for the provider's ID token.
    async fn exchange_code(&self, code: &str) -> AppResult<String>;

    /// Checks the ID token signature, audience and issuer, then extracts the email.
    async fn verify_id_token(&self, id_token: &str) -> AppResult<VerifiedIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    email: String,
}

pub struct GoogleIdentityProvider {
    config: SsoConfig,
    client: reqwest::Client,
}

impl GoogleIdentityProvider {
    pub fn new(config: SsoConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_keys(&self) -> AppResult<JwkSet> {
        let response = self
            .client
            .get(&self.config.certs_url)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "failed to reach provider certificate endpoint");
                AppError::bad_request("Failed to fetch user info")
            })?;

        response.json::<JwkSet>().await.map_err(|err| {
            tracing::warn!(error = %err, "provider certificate set is malformed");
            AppError::bad_request("Failed to fetch user info")
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<String> {
        let scope = self.config.scope();
        let response = self
            .client
            .post(self.config.token_url())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", scope.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| AppError::upstream(502, format!("Failed to fetch token: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "code exchange rejected by provider");
            return Err(AppError::upstream(status.as_u16(), "Failed to fetch token"));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|err| AppError::upstream(502, format!("Failed to fetch token: {err}")))?;

        Ok(token.id_token)
    }

    async fn verify_id_token(&self, id_token: &str) -> AppResult<VerifiedIdentity> {
        let rejected = |reason: String| {
            tracing::warn!(reason = %reason, "identity token rejected");
            AppError::bad_request("Failed to fetch user info")
        };

        let header = jsonwebtoken::decode_header(id_token).map_err(|err| rejected(err.to_string()))?;
        let kid = header.kid.ok_or_else(|| rejected("token header carries no key id".to_string()))?;

        let keys = self.fetch_keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| rejected(format!("no provider key matches kid {kid}")))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|err| rejected(err.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|err| rejected(err.to_string()))?
            .claims;

        Ok(VerifiedIdentity { email: claims.email })
    }
}
