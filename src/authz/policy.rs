use serde_json::{Map, Value};

use super::principal::Principal;
use super::roles::{ADMIN, READ_ONLY, TASK_CREATOR};
use crate::errors::{AppError, AppResult};

const READ_TIER: &[&str] = &[ADMIN, TASK_CREATOR, READ_ONLY];
const ADMIN_ONLY: &[&str] = &[ADMIN];
const TASK_WRITERS: &[&str] = &[ADMIN, TASK_CREATOR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Role,
    Project,
    Task,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "user",
            Resource::Role => "role",
            Resource::Project => "project",
            Resource::Task => "task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    /// `status_only` is true when the payload carries exactly one field, `status`.
    PartialUpdate { status_only: bool },
    Delete,
}

impl Action {
    pub fn partial_update(payload: &Map<String, Value>) -> Self {
        Action::PartialUpdate {
            status_only: payload.len() == 1 && payload.contains_key("status"),
        }
    }

    fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// A role requirement composed from any-of / all-of combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    AnyOf(&'static [&'static str]),
    AllOf(&'static [&'static str]),
}

impl Requirement {
    pub fn satisfied_by(&self, principal: &Principal) -> bool {
        match self {
            Requirement::AnyOf(roles) => principal.has_any(roles),
            Requirement::AllOf(roles) => principal.has_all(roles),
        }
    }
}

/// The role requirement guarding `action` on `resource`.
pub fn requirement(resource: Resource, action: Action) -> Requirement {
    if action.is_read() {
        return Requirement::AnyOf(READ_TIER);
    }

    match (resource, action) {
        (Resource::Task, Action::PartialUpdate { status_only: true }) => Requirement::AnyOf(READ_TIER),
        (Resource::Task, _) => Requirement::AnyOf(TASK_WRITERS),
        (Resource::User | Resource::Role | Resource::Project, _) => Requirement::AllOf(ADMIN_ONLY),
    }
}

/// Pure gate: depends only on the caller's role set and the requested action.
pub fn authorize(principal: &Principal, resource: Resource, action: Action) -> bool {
    requirement(resource, action).satisfied_by(principal)
}

pub fn ensure(principal: &Principal, resource: Resource, action: Action) -> AppResult<()> {
    if authorize(principal, resource, action) {
        return Ok(());
    }

    tracing::info!(
        user_id = %principal.user_id,
        resource = resource.as_str(),
        action = ?action,
        "permission denied"
    );
    Err(AppError::forbidden("You do not have permission to perform this action."))
}
