mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{read_json, TestApp, PASSWORD};
use task_tracker::authz::roles::{ADMIN, READ_ONLY, TASK_CREATOR};
use task_tracker::db::seed::{self, NewUser};
use task_tracker::jwt::TokenType;

#[tokio::test]
async fn password_login_issues_pair_with_custom_claims() -> Result<()> {
    let app = TestApp::new().await?;
    let user = NewUser {
        email: "ada@example.com",
        first_name: "Ada",
        last_name: "Lovelace",
        password: Some(PASSWORD),
    };
    let user_id = seed::create_user(&app.pool, user, &[READ_ONLY, TASK_CREATOR]).await?;

    let (status, body) = app
        .post("/api/token", None, json!({"email": "ada@example.com", "password": PASSWORD}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let access = body["access"].as_str().expect("access token");
    let refresh = body["refresh"].as_str().expect("refresh token");

    let claims = app.state.jwt.decode(access, TokenType::Access)?;
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.short_name, "A L");
    assert_eq!(claims.roles, vec![READ_ONLY.to_string(), TASK_CREATOR.to_string()]);

    assert!(app.state.jwt.decode(refresh, TokenType::Refresh).is_ok());

    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() -> Result<()> {
    let app = TestApp::new().await?;
    app.user("ada@example.com", &[READ_ONLY]).await?;

    let (status, _) = app
        .post("/api/token", None, json!({"email": "ada@example.com", "password": "wrong-password"}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/token", None, json!({"email": "nobody@example.com", "password": PASSWORD}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn sso_only_account_cannot_use_password_login() -> Result<()> {
    let app = TestApp::new().await?;
    let user = NewUser {
        email: "sso@example.com",
        password: None,
        ..NewUser::default()
    };
    seed::create_user(&app.pool, user, &[READ_ONLY]).await?;

    let (status, _) = app
        .post("/api/token", None, json!({"email": "sso@example.com", "password": ""}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn refresh_rotates_access_and_rejects_access_tokens() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("ada@example.com", &[ADMIN]).await?;

    let (status, body) = app
        .post("/api/token/refresh", None, json!({"refresh": user.tokens.refresh}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let access = body["access"].as_str().expect("access token").to_string();
    assert!(body.get("refresh").is_none());

    let (status, me) = app.get("/api/users/me", &access).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");

    let (status, _) = app
        .post("/api/token/refresh", None, json!({"refresh": user.tokens.access}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a refresh credential is not accepted as a bearer token
    let (status, _) = app.get("/api/users/me", &user.tokens.refresh).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn missing_or_garbage_bearer_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await?;

    let resp = app
        .send(Request::builder().uri("/api/tasks").body(Body::empty())?)
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(resp).await?;
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.get("/api/tasks", "not-a-jwt").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn malformed_body_reports_field_path() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post("/api/token", None, json!({"email": 42, "password": "x"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("email"), "{}", body);

    Ok(())
}
