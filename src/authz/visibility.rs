//! Narrows project and task collections to what a caller may see.
//!
//! Scopes are computed from the caller's role set and rendered either as a SQL
//! predicate (for queries) or evaluated in memory against ownership facts.

use uuid::Uuid;

use super::principal::Principal;
use super::roles::{ADMIN, READ_ONLY, TASK_CREATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    All,
    /// Projects listing the caller as a member. Ownership alone does not count.
    MemberOf(Uuid),
}

impl ProjectScope {
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.has_role(ADMIN) {
            ProjectScope::All
        } else {
            ProjectScope::MemberOf(principal.user_id)
        }
    }

    /// Predicate over a `projects` table aliased `p`, plus its bind values in order.
    pub fn sql_predicate(&self) -> (&'static str, Vec<Uuid>) {
        match self {
            ProjectScope::All => ("1 = 1", Vec::new()),
            ProjectScope::MemberOf(user_id) => (
                "EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ?)",
                vec![*user_id],
            ),
        }
    }

    pub fn includes(&self, member_ids: &[Uuid]) -> bool {
        match self {
            ProjectScope::All => true,
            ProjectScope::MemberOf(user_id) => member_ids.contains(user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    All,
    CreatorOrOwner(Uuid),
    Owner(Uuid),
    Creator(Uuid),
    /// No recognised role. Falls back to every task; kept as-is and logged.
    Unrestricted,
}

impl TaskScope {
    /// First match wins: roles are not exclusive, so the order below matters.
    pub fn for_principal(principal: &Principal) -> Self {
        let user_id = principal.user_id;

        if principal.has_role(ADMIN) {
            TaskScope::All
        } else if principal.has_all(&[TASK_CREATOR, READ_ONLY]) {
            TaskScope::CreatorOrOwner(user_id)
        } else if principal.has_role(READ_ONLY) {
            TaskScope::Owner(user_id)
        } else if principal.has_role(TASK_CREATOR) {
            TaskScope::Creator(user_id)
        } else {
            tracing::warn!(%user_id, "caller holds no recognised role; task scope falls back to all tasks");
            TaskScope::Unrestricted
        }
    }

    /// Predicate over a `tasks` table aliased `t`, plus its bind values in order.
    pub fn sql_predicate(&self) -> (&'static str, Vec<Uuid>) {
        match self {
            TaskScope::All | TaskScope::Unrestricted => ("1 = 1", Vec::new()),
            TaskScope::CreatorOrOwner(user_id) => ("(t.creator_id = ? OR t.owner_id = ?)", vec![*user_id, *user_id]),
            TaskScope::Owner(user_id) => ("t.owner_id = ?", vec![*user_id]),
            TaskScope::Creator(user_id) => ("t.creator_id = ?", vec![*user_id]),
        }
    }

    pub fn includes(&self, owner_id: Option<Uuid>, creator_id: Option<Uuid>) -> bool {
        match self {
            TaskScope::All | TaskScope::Unrestricted => true,
            TaskScope::CreatorOrOwner(user_id) => creator_id == Some(*user_id) || owner_id == Some(*user_id),
            TaskScope::Owner(user_id) => owner_id == Some(*user_id),
            TaskScope::Creator(user_id) => creator_id == Some(*user_id),
        }
    }
}
