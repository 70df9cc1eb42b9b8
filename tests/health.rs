mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use common::TestApp;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, v) = app.request(Method::GET, "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");

    let db_ok = v.get("db_ok").and_then(|b| b.as_bool()).unwrap_or(false);
    assert!(db_ok, "expected db_ok: true, got: {}", v);
    assert_eq!(v["sso_enabled"], false);

    Ok(())
}

#[tokio::test]
async fn create_app_reads_configuration_from_env() -> Result<()> {
    let app = TestApp::new().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    std::env::remove_var("GOOGLE_CLIENT_ID");
    std::env::remove_var("RATE_LIMIT_REQUESTS");
    let router = task_tracker::create_app(app.pool.clone()).await?;

    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    let resp = router
        .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}
