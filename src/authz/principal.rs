use std::collections::HashSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// The authenticated caller with the role names held at the time of the request.
///
/// Roles are read from the database once per request, so a role change applies to
/// the caller's next request regardless of what the bearer token claims.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: HashSet<String>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            roles: HashSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn has_all(&self, roles: &[&str]) -> bool {
        roles.iter().all(|role| self.has_role(role))
    }

    /// Resolves the caller's current role set. A user that no longer exists is
    /// treated as unauthenticated.
    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> AppResult<Self> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        if exists == 0 {
            return Err(AppError::unauthorized("user no longer exists"));
        }

        let roles = role_names(pool, user_id).await?;
        Ok(Self::new(user_id).with_roles(roles))
    }
}

pub async fn role_names(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT r.name FROM roles r INNER JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(names)
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Principal::load(&state.pool, auth.user_id).await
    }
}
