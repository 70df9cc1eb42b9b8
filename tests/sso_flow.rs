mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use reqwest::Url;
use serde_json::{json, Value};

use common::TestApp;
use task_tracker::authz::roles::READ_ONLY;
use task_tracker::errors::{AppError, AppResult};
use task_tracker::jwt::TokenType;
use task_tracker::sso::{
    HandoffStore, IdentityProvider, SsoBridge, SsoConfig, VerifiedIdentity, OAUTH_STATE, UNKNOWN_USER_MESSAGE,
};

/// Treats the authorization code as the email the provider vouches for.
struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<String> {
        match code {
            "revoked" => Err(AppError::upstream(401, "Failed to fetch token")),
            _ => Ok(format!("signed:{code}")),
        }
    }

    async fn verify_id_token(&self, id_token: &str) -> AppResult<VerifiedIdentity> {
        match id_token.strip_prefix("signed:") {
            Some("tampered") | None => Err(AppError::bad_request("Failed to fetch user info")),
            Some(email) => Ok(VerifiedIdentity { email: email.to_string() }),
        }
    }
}

fn config() -> SsoConfig {
    SsoConfig {
        client_id: "client-123".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://localhost:8000/api/auth/google/callback".to_string(),
        authority: "https://accounts.google.com/o/oauth2".to_string(),
        scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
        certs_url: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
        frontend_uri: "http://localhost:3000".to_string(),
    }
}

async fn sso_app(handoff: HandoffStore) -> Result<TestApp> {
    TestApp::build(move |state| {
        state
            .with_sso(SsoBridge::new(config(), Arc::new(FakeProvider)))
            .with_handoff(handoff)
    })
    .await
}

async fn get_raw(app: &TestApp, uri: &str) -> Result<(StatusCode, Option<String>)> {
    let resp = app.send(Request::builder().uri(uri).body(Body::empty())?).await?;
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Ok((resp.status(), location))
}

/// Runs the callback for `code` and returns the handoff key from the front-end redirect.
async fn callback_key(app: &TestApp, code: &str) -> Result<String> {
    let (status, location) = get_raw(app, &format!("/api/auth/google/callback?code={code}")).await?;
    assert_eq!(status, StatusCode::FOUND);

    let url = Url::parse(&location.context("missing location")?)?;
    assert_eq!(url.path(), "/sso/");
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params.get("status").map(String::as_str), Some("success"));
    params.get("token").cloned().context("missing token")
}

async fn redeem(app: &TestApp, key: &str) -> Result<(StatusCode, Value)> {
    app.post("/api/sso/token/data", None, json!({"token": key})).await
}

#[tokio::test]
async fn login_redirects_to_provider_with_fixed_parameters() -> Result<()> {
    let app = sso_app(HandoffStore::default()).await?;

    let (status, location) = get_raw(&app, "/api/auth/google/login").await?;
    assert_eq!(status, StatusCode::FOUND);

    let url = Url::parse(&location.context("missing location")?)?;
    assert_eq!(url.host_str(), Some("accounts.google.com"));
    assert_eq!(url.path(), "/o/oauth2/v2/auth");

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["client_id"], "client-123");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["access_type"], "offline");
    assert_eq!(params["scope"], "openid email profile");
    assert_eq!(params["state"], OAUTH_STATE);

    Ok(())
}

#[tokio::test]
async fn known_email_redeems_credentials_exactly_once() -> Result<()> {
    let app = sso_app(HandoffStore::default()).await?;
    let user = app.user("ada@example.com", &[READ_ONLY]).await?;

    let key = callback_key(&app, "ada@example.com").await?;
    assert_eq!(key.len(), 32);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

    let (status, payload) = redeem(&app, &key).await?;
    assert_eq!(status, StatusCode::OK);
    let access = payload["access"].as_str().context("missing access")?;
    assert!(payload["refresh"].is_string());

    let claims = app.state.jwt.decode(access, TokenType::Access)?;
    assert_eq!(claims.sub, user.id);

    let (status, me) = app.get("/api/users/me", access).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");

    let (status, again) = redeem(&app, &key).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again, json!({}));

    Ok(())
}

#[tokio::test]
async fn unknown_email_hands_off_error_payload() -> Result<()> {
    let app = sso_app(HandoffStore::default()).await?;

    let key = callback_key(&app, "stranger@example.com").await?;
    let (status, payload) = redeem(&app, &key).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({"status": "error", "message": UNKNOWN_USER_MESSAGE}));

    Ok(())
}

#[tokio::test]
async fn callback_failures_terminate_the_flow() -> Result<()> {
    let app = sso_app(HandoffStore::default()).await?;

    let (status, _) = get_raw(&app, "/api/auth/google/callback").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_raw(&app, "/api/auth/google/callback?code=revoked").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_raw(&app, "/api/auth/google/callback?code=tampered").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.state.handoff.is_empty());

    Ok(())
}

#[tokio::test]
async fn expired_key_redeems_to_empty_payload() -> Result<()> {
    let app = sso_app(HandoffStore::new(Duration::from_millis(50))).await?;
    app.user("ada@example.com", &[READ_ONLY]).await?;

    let key = callback_key(&app, "ada@example.com").await?;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let (status, payload) = redeem(&app, &key).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({}));

    Ok(())
}

#[tokio::test]
async fn redemption_validates_token_field() -> Result<()> {
    let app = sso_app(HandoffStore::default()).await?;

    let (status, _) = app.post("/api/sso/token/data", None, json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = redeem(&app, "").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = redeem(&app, &"x".repeat(33)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, payload) = redeem(&app, "neverissued").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({}));

    Ok(())
}

#[tokio::test]
async fn unconfigured_sso_reports_configuration_error() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, _) = get_raw(&app, "/api/auth/google/login").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, payload) = redeem(&app, "anything").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({}));

    Ok(())
}
