use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::models::user::{DbUser, TokenPair};
use crate::utils::short_name;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub access_exp_minutes: i64,
    pub refresh_exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            access_exp_minutes: 60,
            refresh_exp_hours: 24,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let access_exp_minutes = std::env::var("JWT_ACCESS_EXP_MINUTES")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(60))
            .map_err(|_| AppError::configuration("JWT_ACCESS_EXP_MINUTES must be a valid integer"))?;
        let refresh_exp_hours = std::env::var("JWT_REFRESH_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_REFRESH_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            access_exp_minutes,
            refresh_exp_hours,
        })
    }

    /// Issues a fresh access + refresh pair for `subject`.
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.issue(subject, TokenType::Access)?,
            refresh: self.issue(subject, TokenType::Refresh)?,
        })
    }

    pub fn issue(&self, subject: &TokenSubject, token_type: TokenType) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = match token_type {
            TokenType::Access => now + Duration::minutes(self.access_exp_minutes),
            TokenType::Refresh => now + Duration::hours(self.refresh_exp_hours),
        };

        let claims = Claims {
            sub: subject.user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4(),
            token_type,
            short_name: subject.short_name.clone(),
            roles: subject.roles.clone(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))?;

        if claims.token_type != expected {
            return Err(AppError::token("token has wrong type"));
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub jti: Uuid,
    pub token_type: TokenType,
    #[serde(default)]
    pub short_name: String,
    /// Role names at issue time. Informational; authorization reloads roles.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Who a credential pair is issued for, with the custom claims it carries.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub short_name: String,
    pub roles: Vec<String>,
}

impl TokenSubject {
    pub fn new(user: &DbUser, roles: Vec<String>) -> Self {
        Self {
            user_id: user.id,
            short_name: short_name(&user.first_name, &user.last_name),
            roles,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))?;

        let claims = state.jwt.decode(token, TokenType::Access)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}
