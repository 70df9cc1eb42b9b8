pub mod app;
pub mod authz;
pub mod db;
pub mod docs;
pub mod errors;
pub mod extract;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sso;
pub mod utils;

pub use app::{build_router, create_app, AppState};
