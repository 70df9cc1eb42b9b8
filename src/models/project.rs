use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: String,
    #[schema(example = "2025-06-10")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-09-10")]
    pub end_date: NaiveDate,
    pub owner_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub task_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn from_db(value: DbProject, member_ids: Vec<Uuid>, task_ids: Vec<Uuid>) -> Self {
        Project {
            id: value.id,
            name: value.name,
            description: value.description,
            start_date: value.start_date,
            end_date: value.end_date,
            owner_id: value.owner_id,
            member_ids,
            task_ids,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[serde(default)]
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: String,
    #[schema(example = "2025-06-10")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-09-10")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub owner_id: Option<Uuid>,
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProjectPatchRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub member_ids: Option<Vec<Uuid>>,
}

impl From<ProjectUpdateRequest> for ProjectPatchRequest {
    fn from(value: ProjectUpdateRequest) -> Self {
        ProjectPatchRequest {
            name: Some(value.name),
            description: Some(value.description),
            start_date: Some(value.start_date),
            end_date: Some(value.end_date),
            owner_id: value.owner_id,
            member_ids: Some(value.member_ids),
        }
    }
}
