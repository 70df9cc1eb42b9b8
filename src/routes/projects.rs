use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ensure, Action, Principal, ProjectScope, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::models::project::{DbProject, Project, ProjectCreateRequest, ProjectPatchRequest, ProjectUpdateRequest};
use crate::models::task::{DbTask, Task};
use crate::routes::tasks::TASK_COLUMNS;
use crate::utils::utc_now;

const PROJECT_COLUMNS: &str = "p.id AS id, p.name AS name, p.description AS description, p.start_date AS start_date, \
     p.end_date AS end_date, p.owner_id AS owner_id, p.created_at AS created_at, p.updated_at AS updated_at";

const DUPLICATE_NAME: &str = "project with this name already exists.";

#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    responses((status = 200, description = "Projects visible to the caller", body = [Project])),
    security(("bearerAuth" = []))
)]
pub async fn list_projects(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Project>>> {
    ensure(&principal, Resource::Project, Action::List)?;

    let (predicate, binds) = ProjectScope::for_principal(&principal).sql_predicate();
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE {predicate} ORDER BY p.created_at DESC");
    let mut query = sqlx::query_as::<_, DbProject>(&sql);
    for value in binds {
        query = query.bind(value);
    }
    let rows = query.fetch_all(&state.pool).await?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        projects.push(hydrate(&state.pool, row).await?);
    }

    Ok(Json(projects))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project detail", body = Project), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    ensure(&principal, Resource::Project, Action::Retrieve)?;
    let row = fetch_visible_project(&state.pool, &principal, id).await?;
    Ok(Json(hydrate(&state.pool, row).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created; the caller becomes owner", body = Project),
        (status = 400, description = "Invalid dates or unknown member"),
        (status = 409, description = "Project name already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(payload): ValidJson<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    ensure(&principal, Resource::Project, Action::Create)?;
    let name = validate_name(&payload.name)?;
    validate_dates(payload.start_date, payload.end_date)?;

    let now = utc_now();
    let project_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, name, description, start_date, end_date, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(&name)
    .bind(&payload.description)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_NAME))?;

    replace_members(&mut *tx, project_id, &payload.member_ids).await?;
    tx.commit().await?;

    tracing::info!(%project_id, owner_id = %principal.user_id, "project created");
    let row = fetch_project(&state.pool, project_id).await?;
    Ok((StatusCode::CREATED, Json(hydrate(&state.pool, row).await?)))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project replaced", body = Project)),
    security(("bearerAuth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    ensure(&principal, Resource::Project, Action::Update)?;
    apply_project_changes(&state.pool, &principal, id, payload.into()).await.map(Json)
}

#[utoipa::path(
    patch,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectPatchRequest,
    responses((status = 200, description = "Project updated", body = Project)),
    security(("bearerAuth" = []))
)]
pub async fn patch_project(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ProjectPatchRequest>,
) -> AppResult<Json<Project>> {
    ensure(&principal, Resource::Project, Action::PartialUpdate { status_only: false })?;
    apply_project_changes(&state.pool, &principal, id, payload).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 204, description = "Project and its tasks deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure(&principal, Resource::Project, Action::Delete)?;
    let project = fetch_visible_project(&state.pool, &principal, id).await?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(project_id = %id, deleted_by = %principal.user_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Tasks under one project. Neither the project lookup nor the task list goes
/// through the visibility filter; the read gate is the only check.
#[utoipa::path(
    get,
    path = "/api/projects/{id}/tasks",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "All tasks of the project", body = [Task]), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn list_project_tasks(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Task>>> {
    ensure(&principal, Resource::Project, Action::Retrieve)?;
    let project = fetch_project(&state.pool, id).await?;

    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ? ORDER BY t.due_date, t.created_at");
    let tasks = sqlx::query_as::<_, DbTask>(&sql)
        .bind(project.id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(tasks.into_iter().map(Task::from).collect()))
}

async fn apply_project_changes(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    changes: ProjectPatchRequest,
) -> AppResult<Project> {
    let mut project = fetch_visible_project(pool, principal, id).await?;

    if let Some(name) = changes.name {
        project.name = validate_name(&name)?;
    }
    if let Some(description) = changes.description {
        project.description = description;
    }
    if let Some(start_date) = changes.start_date {
        project.start_date = start_date;
    }
    if let Some(end_date) = changes.end_date {
        project.end_date = end_date;
    }
    validate_dates(project.start_date, project.end_date)?;

    let mut tx = pool.begin().await?;

    if let Some(owner_id) = changes.owner_id {
        ensure_users_exist(&mut *tx, "owner_id", &[owner_id]).await?;
        project.owner_id = owner_id;
    }

    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, start_date = ?, end_date = ?, owner_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(project.owner_id)
    .bind(utc_now())
    .bind(project.id)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from_unique_violation(err, DUPLICATE_NAME))?;

    if let Some(member_ids) = changes.member_ids.as_deref() {
        replace_members(&mut *tx, project.id, member_ids).await?;
    }
    tx.commit().await?;

    let row = fetch_project(pool, project.id).await?;
    hydrate(pool, row).await
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name: This field may not be blank."));
    }
    Ok(name.to_string())
}

fn validate_dates(start: chrono::NaiveDate, end: chrono::NaiveDate) -> AppResult<()> {
    if end < start {
        return Err(AppError::bad_request("end_date: End date must not be before start date."));
    }
    Ok(())
}

pub(crate) async fn ensure_users_exist(conn: &mut SqliteConnection, field: &str, user_ids: &[Uuid]) -> AppResult<()> {
    for user_id in user_ids {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 {
            return Err(AppError::bad_request(format!("{field}: Invalid pk \"{user_id}\" - object does not exist.")));
        }
    }
    Ok(())
}

async fn replace_members(conn: &mut SqliteConnection, project_id: Uuid, member_ids: &[Uuid]) -> AppResult<()> {
    ensure_users_exist(&mut *conn, "member_ids", member_ids).await?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut *conn)
        .await?;

    for user_id in member_ids {
        sqlx::query("INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn fetch_project(pool: &SqlitePool, id: Uuid) -> AppResult<DbProject> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?");
    sqlx::query_as::<_, DbProject>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

/// Looks the project up through the caller's visibility scope; hidden reads as absent.
async fn fetch_visible_project(pool: &SqlitePool, principal: &Principal, id: Uuid) -> AppResult<DbProject> {
    let (predicate, binds) = ProjectScope::for_principal(principal).sql_predicate();
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ? AND {predicate}");

    let mut query = sqlx::query_as::<_, DbProject>(&sql).bind(id);
    for value in binds {
        query = query.bind(value);
    }

    query
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

async fn hydrate(pool: &SqlitePool, row: DbProject) -> AppResult<Project> {
    let member_ids = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM project_members WHERE project_id = ?")
        .bind(row.id)
        .fetch_all(pool)
        .await?;
    let task_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM tasks WHERE project_id = ? ORDER BY created_at")
        .bind(row.id)
        .fetch_all(pool)
        .await?;

    Ok(Project::from_db(row, member_ids, task_ids))
}
