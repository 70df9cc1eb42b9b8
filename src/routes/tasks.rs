use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ensure, Action, Principal, Resource, TaskScope};
use crate::errors::{AppError, AppResult};
use crate::extract::{from_value, ValidJson};
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskPatchRequest, TaskUpdateRequest};
use crate::routes::projects::ensure_users_exist;
use crate::utils::utc_now;

pub(crate) const TASK_COLUMNS: &str = "t.id AS id, t.description AS description, t.due_date AS due_date, \
     t.status AS status, t.project_id AS project_id, t.owner_id AS owner_id, t.creator_id AS creator_id, \
     t.created_at AS created_at, t.updated_at AS updated_at";

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    responses((status = 200, description = "Tasks visible to the caller", body = [Task])),
    security(("bearerAuth" = []))
)]
pub async fn list_tasks(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Task>>> {
    ensure(&principal, Resource::Task, Action::List)?;

    let (predicate, binds) = TaskScope::for_principal(&principal).sql_predicate();
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE {predicate} ORDER BY t.due_date, t.created_at");
    let mut query = sqlx::query_as::<_, DbTask>(&sql);
    for value in binds {
        query = query.bind(value);
    }

    let tasks = query.fetch_all(&state.pool).await?;
    Ok(Json(tasks.into_iter().map(Task::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses((status = 200, description = "Task detail", body = Task), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    ensure(&principal, Resource::Task, Action::Retrieve)?;
    Ok(Json(fetch_visible_task(&state.pool, &principal, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created; the caller becomes creator", body = Task),
        (status = 400, description = "Unknown project or owner")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    ValidJson(payload): ValidJson<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    ensure(&principal, Resource::Task, Action::Create)?;
    let description = validate_description(&payload.description)?;

    let now = utc_now();
    let task_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    ensure_project_exists(&mut *tx, payload.project_id).await?;
    if let Some(owner_id) = payload.owner_id {
        ensure_users_exist(&mut *tx, "owner_id", &[owner_id]).await?;
    }

    sqlx::query(
        "INSERT INTO tasks (id, description, due_date, status, project_id, owner_id, creator_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(&description)
    .bind(payload.due_date)
    .bind(payload.status)
    .bind(payload.project_id)
    .bind(payload.owner_id)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(%task_id, creator_id = %principal.user_id, "task created");
    Ok((StatusCode::CREATED, Json(fetch_task(&state.pool, task_id).await?.into())))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses((status = 200, description = "Task replaced", body = Task)),
    security(("bearerAuth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    ensure(&principal, Resource::Task, Action::Update)?;
    apply_task_changes(&state.pool, &principal, id, payload.into()).await.map(Json)
}

/// Partial update. A body holding nothing but `status` passes the read-tier gate;
/// any other shape needs a task writer. The gate runs before the body is applied.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskPatchRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Fields beyond status require admin or task_creator"),
        (status = 404, description = "Not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn patch_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<Value>,
) -> AppResult<Json<Task>> {
    let fields = body
        .as_object()
        .ok_or_else(|| AppError::bad_request("Invalid data. Expected a dictionary."))?;
    ensure(&principal, Resource::Task, Action::partial_update(fields))?;

    let changes: TaskPatchRequest = from_value(body)?;
    apply_task_changes(&state.pool, &principal, id, changes).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses((status = 204, description = "Task deleted"), (status = 404, description = "Not found")),
    security(("bearerAuth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure(&principal, Resource::Task, Action::Delete)?;
    let task = fetch_visible_task(&state.pool, &principal, id).await?;

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn apply_task_changes(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    changes: TaskPatchRequest,
) -> AppResult<Task> {
    let mut task = fetch_visible_task(pool, principal, id).await?;

    if let Some(description) = changes.description {
        task.description = validate_description(&description)?;
    }
    if let Some(due_date) = changes.due_date {
        task.due_date = due_date;
    }
    if let Some(status) = changes.status {
        task.status = status;
    }

    let mut tx = pool.begin().await?;

    if let Some(project_id) = changes.project_id {
        ensure_project_exists(&mut *tx, project_id).await?;
        task.project_id = project_id;
    }
    if let Some(owner_id) = changes.owner_id {
        if let Some(owner_id) = owner_id {
            ensure_users_exist(&mut *tx, "owner_id", &[owner_id]).await?;
        }
        task.owner_id = owner_id;
    }

    sqlx::query(
        "UPDATE tasks SET description = ?, due_date = ?, status = ?, project_id = ?, owner_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.description)
    .bind(task.due_date)
    .bind(task.status)
    .bind(task.project_id)
    .bind(task.owner_id)
    .bind(utc_now())
    .bind(task.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::debug!(task_id = %task.id, updated_by = %principal.user_id, "task updated");
    Ok(fetch_task(pool, task.id).await?.into())
}

fn validate_description(description: &str) -> AppResult<String> {
    if description.trim().is_empty() {
        return Err(AppError::bad_request("description: This field may not be blank."));
    }
    Ok(description.to_string())
}

async fn ensure_project_exists(conn: &mut SqliteConnection, project_id: Uuid) -> AppResult<()> {
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_one(&mut *conn)
        .await?;
    if exists == 0 {
        return Err(AppError::bad_request(format!(
            "project_id: Invalid pk \"{project_id}\" - object does not exist."
        )));
    }
    Ok(())
}

async fn fetch_task(pool: &SqlitePool, id: Uuid) -> AppResult<DbTask> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?");
    sqlx::query_as::<_, DbTask>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

/// Looks the task up through the caller's visibility scope; hidden reads as absent.
async fn fetch_visible_task(pool: &SqlitePool, principal: &Principal, id: Uuid) -> AppResult<DbTask> {
    let (predicate, binds) = TaskScope::for_principal(principal).sql_predicate();
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ? AND {predicate}");

    let mut query = sqlx::query_as::<_, DbTask>(&sql).bind(id);
    for value in binds {
        query = query.bind(value);
    }

    query
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}
