use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "task_creator")]
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRole {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbRole> for Role {
    fn from(db: DbRole) -> Self {
        Role {
            id: db.id,
            name: db.name,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    #[schema(example = "reviewer")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RolePatchRequest {
    pub name: Option<String>,
}
