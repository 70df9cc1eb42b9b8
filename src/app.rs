use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::middleware::{rate_limit, RateLimitConfig, RateLimiter};
use crate::routes::{auth, health, projects, roles, sso, tasks, users};
use crate::sso::{HandoffStore, SsoBridge, SsoConfig};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    /// `None` when Google sign-in is not configured.
    pub sso: Option<Arc<SsoBridge>>,
    pub handoff: HandoffStore,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            sso: None,
            handoff: HandoffStore::default(),
            rate_limiter: None,
        }
    }

    pub fn with_sso(mut self, bridge: SsoBridge) -> Self {
        self.sso = Some(Arc::new(bridge));
        self
    }

    pub fn with_handoff(mut self, store: HandoffStore) -> Self {
        self.handoff = store;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiter = Some(Arc::new(RateLimiter::new(config)));
        self
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let mut state = AppState::new(pool, jwt_config);

    match SsoConfig::from_env()? {
        Some(config) => state = state.with_sso(SsoBridge::google(config)),
        None => tracing::info!("GOOGLE_CLIENT_ID not set; google sign-in disabled"),
    }

    if let Some(config) = RateLimitConfig::from_env()? {
        tracing::info!(max_requests = config.max_requests, window_secs = config.window.as_secs(), "rate limiting enabled");
        state = state.with_rate_limit(config);
    }

    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let token_routes = Router::new()
        .route("/", post(auth::obtain_token_pair))
        .route("/refresh", post(auth::refresh_token));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/me", get(users::me))
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        );

    let role_routes = Router::new()
        .route("/", get(roles::list_roles).post(roles::create_role))
        .route(
            "/:id",
            get(roles::get_role)
                .put(roles::update_role)
                .patch(roles::patch_role)
                .delete(roles::delete_role),
        );

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .patch(projects::patch_project)
                .delete(projects::delete_project),
        )
        .route("/:id/tasks", get(projects::list_project_tasks));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .patch(tasks::patch_task)
                .delete(tasks::delete_task),
        );

    let sso_routes = Router::new()
        .route("/auth/google/login", get(sso::google_login))
        .route("/auth/google/callback", get(sso::google_callback))
        .route("/sso/token/data", post(sso::redeem_handoff));

    let api = Router::new()
        .route("/health", get(health::health))
        .nest("/token", token_routes)
        .nest("/users", user_routes)
        .nest("/roles", role_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .merge(sso_routes);

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
