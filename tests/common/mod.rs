#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use task_tracker::db::seed::{self, NewUser};
use task_tracker::jwt::{JwtConfig, TokenSubject};
use task_tracker::models::user::TokenPair;
use task_tracker::{build_router, AppState};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    // keeps the sqlite file alive for the duration of the test
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub router: Router,
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub tokens: TokenPair,
}

impl TestUser {
    pub fn token(&self) -> &str {
        &self.tokens.access
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::build(|state| state).await
    }

    /// Migrated temp database with default roles, state customised by `configure`.
    pub async fn build(configure: impl FnOnce(AppState) -> AppState) -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("test.db");

        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_path())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;
        seed::ensure_default_roles(&pool).await?;

        let state = configure(AppState::new(pool.clone(), JwtConfig::new("test-secret")));
        let router = build_router(state.clone());

        Ok(Self {
            _dir: dir,
            pool,
            state,
            router,
        })
    }

    /// Creates a password account holding `roles` and signs it in.
    pub async fn user(&self, email: &str, roles: &[&str]) -> Result<TestUser> {
        let user = NewUser {
            email,
            first_name: "Test",
            last_name: "User",
            password: Some(PASSWORD),
        };
        let id = seed::create_user(&self.pool, user, roles).await?;
        let tokens = self.tokens_for(id, roles)?;

        Ok(TestUser {
            id,
            email: email.to_string(),
            tokens,
        })
    }

    pub fn tokens_for(&self, user_id: Uuid, roles: &[&str]) -> Result<TokenPair> {
        let subject = TokenSubject {
            user_id,
            short_name: "T U".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        Ok(self.state.jwt.issue_pair(&subject)?)
    }

    pub async fn send(&self, req: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(req).await?)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.send(req).await?;
        let status = resp.status();
        Ok((status, read_json(resp).await?))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

pub async fn read_json(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)
        .with_context(|| format!("response is not JSON: {}", String::from_utf8_lossy(&bytes)))?)
}

pub fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn id_of(value: &Value) -> Result<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("missing id in {}", value))
}
