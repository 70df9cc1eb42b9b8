//! Google sign-in bridged to locally issued credentials.
//!
//! The callback never hands credentials to the browser directly. It parks them (or
//! the reason there are none) in the [`HandoffStore`] under a random key, redirects
//! the browser to the front-end with that key, and the front-end redeems it once.

mod google;
mod handoff;

use std::sync::Arc;

use reqwest::Url;
use sqlx::SqlitePool;

pub use google::{GoogleIdentityProvider, IdentityProvider, VerifiedIdentity};
pub use handoff::{generate_key, HandoffPayload, HandoffStore, HANDOFF_KEY_LEN, HANDOFF_TTL};

use crate::authz::role_names;
use crate::errors::{AppError, AppResult};
use crate::jwt::{JwtConfig, TokenSubject};
use crate::models::user::DbUser;

/// Fixed anti-forgery value sent with every authorization request.
pub const OAUTH_STATE: &str = "560008";

pub const UNKNOWN_USER_MESSAGE: &str =
    "User is not exists with 'Task Tracker' System. please contact to admin e.g. admin@tracker.com";

const DEFAULT_AUTHORITY: &str = "https://accounts.google.com/o/oauth2";
const DEFAULT_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_SCOPES: &str = "openid email profile";

#[derive(Debug, Clone)]
pub struct SsoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authority: String,
    pub scopes: Vec<String>,
    pub certs_url: String,
    pub frontend_uri: String,
}

impl SsoConfig {
    /// `Ok(None)` when `GOOGLE_CLIENT_ID` is unset: SSO stays disabled.
    pub fn from_env() -> Result<Option<Self>, AppError> {
        let Ok(client_id) = std::env::var("GOOGLE_CLIENT_ID") else {
            return Ok(None);
        };

        let required = |name: &str| {
            std::env::var(name).map_err(|_| AppError::configuration(format!("{name} not set")))
        };
        let optional = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());

        Ok(Some(Self {
            client_id,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            authority: optional("GOOGLE_AUTHORITY", DEFAULT_AUTHORITY)
                .trim_end_matches('/')
                .to_string(),
            scopes: optional("GOOGLE_SCOPES", DEFAULT_SCOPES)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            certs_url: optional("GOOGLE_CERTS_URL", DEFAULT_CERTS_URL),
            frontend_uri: required("FRONTEND_URI")?.trim_end_matches('/').to_string(),
        }))
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.authority)
    }

    pub fn authorization_url(&self) -> AppResult<Url> {
        let scope = self.scope();
        Url::parse_with_params(
            &format!("{}/v2/auth", self.authority),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("include_granted_scopes", "true"),
                ("state", OAUTH_STATE),
            ],
        )
        .map_err(|err| AppError::configuration(format!("invalid GOOGLE_AUTHORITY: {err}")))
    }

    /// Where the browser lands once a handoff key has been issued.
    pub fn frontend_redirect(&self, key: &str) -> AppResult<Url> {
        Url::parse_with_params(
            &format!("{}/sso/", self.frontend_uri),
            &[("status", "success"), ("token", key)],
        )
        .map_err(|err| AppError::configuration(format!("invalid FRONTEND_URI: {err}")))
    }
}

/// Configured SSO flow: provider settings plus the provider seam.
#[derive(Clone)]
pub struct SsoBridge {
    pub config: SsoConfig,
    provider: Arc<dyn IdentityProvider>,
}

impl SsoBridge {
    pub fn new(config: SsoConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { config, provider }
    }

    pub fn google(config: SsoConfig) -> Self {
        let provider = Arc::new(GoogleIdentityProvider::new(config.clone()));
        Self::new(config, provider)
    }

    /// Runs the callback stages after a code has arrived and returns the handoff key.
    ///
    /// Provider failures abort the flow. An email without a local account does not:
    /// it produces an error payload that is handed off like credentials would be.
    pub async fn complete(
        &self,
        pool: &SqlitePool,
        jwt: &JwtConfig,
        store: &HandoffStore,
        code: &str,
    ) -> AppResult<String> {
        let id_token = self.provider.exchange_code(code).await?;
        let identity = self.provider.verify_id_token(&id_token).await?;
        let payload = resolve_identity(pool, jwt, &identity.email).await?;

        let key = store.issue(payload);
        tracing::info!(email = %identity.email, "sso handoff key issued");
        Ok(key)
    }
}

pub async fn resolve_identity(pool: &SqlitePool, jwt: &JwtConfig, email: &str) -> AppResult<HandoffPayload> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, first_name, last_name, password_hash, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(user) = user else {
        tracing::info!(%email, "sso identity has no local account");
        return Ok(HandoffPayload::error(UNKNOWN_USER_MESSAGE));
    };

    let roles = role_names(pool, user.id).await?;
    let pair = jwt.issue_pair(&TokenSubject::new(&user, roles))?;
    Ok(HandoffPayload::Credentials(pair))
}
