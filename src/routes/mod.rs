pub mod auth;
pub mod health;
pub mod projects;
pub mod roles;
pub mod sso;
pub mod tasks;
pub mod users;
