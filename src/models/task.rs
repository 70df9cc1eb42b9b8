use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    InProgress,
    Blocked,
    Completed,
    NotStarted,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    #[schema(example = "Write unit tests")]
    pub description: String,
    #[schema(example = "2025-06-15")]
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub project_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub project_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbTask> for Task {
    fn from(value: DbTask) -> Self {
        Task {
            id: value.id,
            description: value.description,
            due_date: value.due_date,
            status: value.status,
            project_id: value.project_id,
            owner_id: value.owner_id,
            creator_id: value.creator_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Write unit tests")]
    pub description: String,
    #[schema(example = "2025-06-15")]
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub project_id: Uuid,
    pub owner_id: Option<Uuid>,
}

/// Full replacement. An omitted `owner_id` keeps the current owner; `null` clears it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub description: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub project_id: Uuid,
    #[serde(default, deserialize_with = "super::double_option")]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub owner_id: Option<Option<Uuid>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TaskPatchRequest {
    #[serde(default, deserialize_with = "super::present")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "super::present")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::present")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "super::present")]
    pub project_id: Option<Uuid>,
    #[serde(default, deserialize_with = "super::double_option")]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub owner_id: Option<Option<Uuid>>,
}

impl From<TaskUpdateRequest> for TaskPatchRequest {
    fn from(value: TaskUpdateRequest) -> Self {
        TaskPatchRequest {
            description: Some(value.description),
            due_date: Some(value.due_date),
            status: Some(value.status),
            project_id: Some(value.project_id),
            owner_id: value.owner_id,
        }
    }
}
