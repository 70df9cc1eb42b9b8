use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ensure, Action, Principal, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::models::role::Role;
use crate::models::user::{DbUser, User, UserCreateRequest, UserPatchRequest, UserUpdateRequest};
use crate::utils::{hash_password, utc_now};

const DUPLICATE_EMAIL: &str = "user with this email already exists.";

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses((status = 200, description = "List users", body = [User])),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<User>>> {
    ensure(&principal, Resource::User, Action::List)?;

    let users = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, first_name, last_name, password_hash, created_at, updated_at FROM users ORDER BY email",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut roles_by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
    let links = sqlx::query_as::<_, (Uuid, Uuid, String)>(
        "SELECT ur.user_id, r.id, r.name FROM user_roles ur INNER JOIN roles r ON r.id = ur.role_id ORDER BY r.name",
    )
    .fetch_all(&state.pool)
    .await?;
    for (user_id, id, name) in links {
        roles_by_user.entry(user_id).or_default().push(Role { id, name });
    }

    let users = users
        .into_iter()
        .map(|user| {
            let roles = roles_by_user.remove(&user.id).unwrap_or_default();
            User::from_db(user, roles)
        })
        .collect();

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "The caller's own profile", body = User),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<User>> {
    ensure(&principal, Resource::User, Action::Retrieve)?;
    Ok(Json(load_user(&state.pool, principal.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail", body = User), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    ensure(&principal, Resource::User, Action::Retrieve)?;
    Ok(Json(load_user(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload or unknown role"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(payload): ValidJson<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    ensure(&principal, Resource::User, Action::Create)?;
    validate_email(&payload.email)?;

    let password_hash = match payload.password.as_deref() {
        Some(password) => hash_password(password)?,
        None => String::new(),
    };

    let now = utc_now();
    let user_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(payload.email.trim())
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_EMAIL))?;

    replace_roles(&mut *tx, user_id, &payload.role_ids).await?;
    tx.commit().await?;

    tracing::info!(%user_id, created_by = %principal.user_id, "user created");
    Ok((StatusCode::CREATED, Json(load_user(&state.pool, user_id).await?)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "User replaced", body = User), (status = 400, description = "Missing role_ids or unknown role")),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    ensure(&principal, Resource::User, Action::Update)?;
    apply_user_changes(&state.pool, id, payload.into()).await.map(Json)
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserPatchRequest,
    responses((status = 200, description = "User updated", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn patch_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UserPatchRequest>,
) -> AppResult<Json<User>> {
    ensure(&principal, Resource::User, Action::PartialUpdate { status_only: false })?;
    apply_user_changes(&state.pool, id, payload).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted"), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure(&principal, Resource::User, Action::Delete)?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, deleted_by = %principal.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn apply_user_changes(pool: &SqlitePool, id: Uuid, changes: UserPatchRequest) -> AppResult<User> {
    let mut user = fetch_db_user(pool, id).await?;

    if let Some(email) = changes.email {
        validate_email(&email)?;
        user.email = email.trim().to_string();
    }
    if let Some(first_name) = changes.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = changes.last_name {
        user.last_name = last_name;
    }
    if let Some(password) = changes.password.as_deref() {
        user.password_hash = hash_password(password)?;
    }

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE users SET email = ?, first_name = ?, last_name = ?, password_hash = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_EMAIL))?;

    if let Some(role_ids) = changes.role_ids.as_deref() {
        replace_roles(&mut *tx, id, role_ids).await?;
    }
    tx.commit().await?;

    load_user(pool, id).await
}

fn validate_email(email: &str) -> AppResult<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("email: Enter a valid email address."));
    }
    Ok(())
}

/// Replaces the user's role links. Every id must name an existing role.
async fn replace_roles(conn: &mut SqliteConnection, user_id: Uuid, role_ids: &[Uuid]) -> AppResult<()> {
    for role_id in role_ids {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 {
            return Err(AppError::bad_request(format!("role_ids: Invalid pk \"{role_id}\" - object does not exist.")));
        }
    }

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let now = utc_now();
    for role_id in role_ids {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(role_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn fetch_db_user(pool: &SqlitePool, id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, email, first_name, last_name, password_hash, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))
}

pub(crate) async fn load_user(pool: &SqlitePool, id: Uuid) -> AppResult<User> {
    let user = fetch_db_user(pool, id).await?;
    let roles = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT r.id, r.name FROM roles r INNER JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, name)| Role { id, name })
    .collect();

    Ok(User::from_db(user, roles))
}
