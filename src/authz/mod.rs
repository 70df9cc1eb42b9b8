//! Authorization module - role gate and visibility scoping
//!
//! - `policy`: decides whether a role set may perform an action on a resource
//! - `visibility`: narrows project/task collections for an allowed caller
//! - `principal`: the caller identity with its per-request role set

mod policy;
mod principal;
mod visibility;

pub use policy::{authorize, ensure, requirement, Action, Requirement, Resource};
pub use principal::{role_names, Principal};
pub use visibility::{ProjectScope, TaskScope};

/// Well-known role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const TASK_CREATOR: &str = "task_creator";
    pub const READ_ONLY: &str = "read_only";

    pub const DEFAULT_ROLES: [&str; 3] = [ADMIN, TASK_CREATOR, READ_ONLY];
}
