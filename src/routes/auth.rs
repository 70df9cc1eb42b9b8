use axum::extract::State;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::role_names;
use crate::errors::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::jwt::{TokenSubject, TokenType};
use crate::models::user::{AccessResponse, DbUser, LoginRequest, RefreshRequest, TokenPair};
use crate::utils::verify_password;

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

#[utoipa::path(
    post,
    path = "/api/token",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh credentials", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn obtain_token_pair(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, first_name, last_name, password_hash, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::info!(email = %payload.email, "password login rejected");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let subject = token_subject(&state.pool, &user).await?;
    Ok(Json(state.jwt.issue_pair(&subject)?))
}

#[utoipa::path(
    post,
    path = "/api/token/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh access credential", body = AccessResponse),
        (status = 401, description = "Invalid or expired refresh credential")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RefreshRequest>,
) -> AppResult<Json<AccessResponse>> {
    let claims = state.jwt.decode(&payload.refresh, TokenType::Refresh)?;
    let user = fetch_user(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    let subject = token_subject(&state.pool, &user).await?;
    let access = state.jwt.issue(&subject, TokenType::Access)?;

    Ok(Json(AccessResponse { access }))
}

async fn token_subject(pool: &SqlitePool, user: &DbUser) -> AppResult<TokenSubject> {
    let roles = role_names(pool, user.id).await?;
    Ok(TokenSubject::new(user, roles))
}

async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, first_name, last_name, password_hash, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
