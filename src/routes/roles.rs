use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ensure, Action, Principal, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::models::role::{DbRole, Role, RolePatchRequest, RoleRequest};
use crate::utils::utc_now;

const DUPLICATE_NAME: &str = "role with this name already exists.";

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "Roles",
    responses((status = 200, description = "List roles", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Role>>> {
    ensure(&principal, Resource::Role, Action::List)?;

    let roles = sqlx::query_as::<_, DbRole>("SELECT id, name, created_at FROM roles ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(roles.into_iter().map(Role::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses((status = 200, description = "Role detail", body = Role), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Role>> {
    ensure(&principal, Resource::Role, Action::Retrieve)?;
    Ok(Json(fetch_role(&state.pool, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "Roles",
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(payload): ValidJson<RoleRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    ensure(&principal, Resource::Role, Action::Create)?;
    let name = validate_name(&payload.name)?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO roles (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(&name)
        .bind(utc_now())
        .execute(&state.pool)
        .await
        .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_NAME))?;

    Ok((StatusCode::CREATED, Json(Role { id, name })))
}

#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = RoleRequest,
    responses((status = 200, description = "Role renamed", body = Role)),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<RoleRequest>,
) -> AppResult<Json<Role>> {
    ensure(&principal, Resource::Role, Action::Update)?;
    rename_role(&state.pool, id, Some(payload.name)).await.map(Json)
}

#[utoipa::path(
    patch,
    path = "/api/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = RolePatchRequest,
    responses((status = 200, description = "Role updated", body = Role)),
    security(("bearerAuth" = []))
)]
pub async fn patch_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<RolePatchRequest>,
) -> AppResult<Json<Role>> {
    ensure(&principal, Resource::Role, Action::PartialUpdate { status_only: false })?;
    rename_role(&state.pool, id, payload.name).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses((status = 204, description = "Role deleted"), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure(&principal, Resource::Role, Action::Delete)?;

    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Role not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn rename_role(pool: &SqlitePool, id: Uuid, name: Option<String>) -> AppResult<Role> {
    let mut role = fetch_role(pool, id).await?;

    if let Some(name) = name {
        role.name = validate_name(&name)?;
        sqlx::query("UPDATE roles SET name = ? WHERE id = ?")
            .bind(&role.name)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_NAME))?;
    }

    Ok(role.into())
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name: This field may not be blank."));
    }
    Ok(name.to_string())
}

async fn fetch_role(pool: &SqlitePool, id: Uuid) -> AppResult<DbRole> {
    sqlx::query_as::<_, DbRole>("SELECT id, name, created_at FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))
}
