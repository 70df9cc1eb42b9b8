mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{id_of, ids, TestApp, TestUser};
use task_tracker::authz::roles::{ADMIN, READ_ONLY, TASK_CREATOR};

async fn project(app: &TestApp, admin: &TestUser, name: &str) -> Result<String> {
    let (status, body) = app
        .post(
            "/api/projects",
            Some(admin.token()),
            json!({"name": name, "start_date": "2025-06-01", "end_date": "2025-12-31"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn task(app: &TestApp, as_user: &TestUser, project_id: &str, description: &str, owner: Option<&TestUser>) -> Result<Value> {
    let (status, body) = app
        .post(
            "/api/tasks",
            Some(as_user.token()),
            json!({
                "description": description,
                "due_date": "2025-07-15",
                "status": "new",
                "project_id": project_id,
                "owner_id": owner.map(|u| u.id),
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(body)
}

#[tokio::test]
async fn creator_and_owner_visibility_scenario() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let u3 = app.user("u3@example.com", &[TASK_CREATOR]).await?;
    let u4 = app.user("u4@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "P1").await?;

    let t1 = task(&app, &u3, &p1, "T1", None).await?;
    assert_eq!(t1["creator_id"], u3.id.to_string());
    assert_eq!(t1["owner_id"], Value::Null);
    let t1_id = id_of(&t1)?;

    let other = task(&app, &admin, &p1, "Unrelated", None).await?;
    let other_id = id_of(&other)?;

    let (_, listed) = app.get("/api/tasks", u3.token()).await?;
    assert_eq!(ids(&listed), vec![t1_id.clone()]);

    // before reassignment u4 sees nothing
    let (_, listed) = app.get("/api/tasks", u4.token()).await?;
    assert!(ids(&listed).is_empty());

    let (status, _) = app
        .patch(&format!("/api/tasks/{t1_id}"), admin.token(), json!({"owner_id": u4.id}))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = app.get("/api/tasks", u4.token()).await?;
    assert_eq!(ids(&listed), vec![t1_id.clone()]);

    let (status, _) = app.get(&format!("/api/tasks/{other_id}"), u4.token()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app.get("/api/tasks", admin.token()).await?;
    assert_eq!(ids(&listed).len(), 2);

    Ok(())
}

#[tokio::test]
async fn dual_role_sees_union_not_intersection() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let dual = app.user("dual@example.com", &[TASK_CREATOR, READ_ONLY]).await?;
    let p1 = project(&app, &admin, "Union").await?;

    let created = id_of(&task(&app, &dual, &p1, "created by me", None).await?)?;
    let owned = id_of(&task(&app, &admin, &p1, "assigned to me", Some(&dual)).await?)?;
    let both = id_of(&task(&app, &dual, &p1, "mine twice", Some(&dual)).await?)?;
    task(&app, &admin, &p1, "not mine", None).await?;

    let (_, listed) = app.get("/api/tasks", dual.token()).await?;
    let mut visible = ids(&listed);
    visible.sort();
    let mut expected = vec![created, owned, both];
    expected.sort();
    assert_eq!(visible, expected);

    Ok(())
}

#[tokio::test]
async fn read_only_owner_may_change_status_and_nothing_else() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let u3 = app.user("u3@example.com", &[TASK_CREATOR]).await?;
    let u4 = app.user("u4@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "P1").await?;
    let t1_id = id_of(&task(&app, &u3, &p1, "T1", Some(&u4)).await?)?;
    let uri = format!("/api/tasks/{t1_id}");

    let (status, updated) = app.patch(&uri, u4.token(), json!({"status": "completed"})).await?;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["status"], "completed");

    let (status, _) = app
        .patch(&uri, u4.token(), json!({"status": "blocked", "description": "x"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, current) = app.get(&uri, u4.token()).await?;
    assert_eq!(current["status"], "completed");
    assert_eq!(current["description"], "T1");

    let (status, _) = app.patch(&uri, u4.token(), json!({"description": "x"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put(
            &uri,
            u4.token(),
            json!({"description": "x", "due_date": "2025-07-15", "status": "new", "project_id": p1}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, u4.token()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn replacing_task_keeps_owner_unless_cleared() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let owner = app.user("owner@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "Replace").await?;
    let uri = format!("/api/tasks/{}", id_of(&task(&app, &admin, &p1, "T1", Some(&owner)).await?)?);

    let (status, replaced) = app
        .put(
            &uri,
            admin.token(),
            json!({"description": "T1 v2", "due_date": "2025-08-01", "status": "in_progress", "project_id": p1}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", replaced);
    assert_eq!(replaced["description"], "T1 v2");
    assert_eq!(replaced["owner_id"], owner.id.to_string());

    let (status, cleared) = app
        .put(
            &uri,
            admin.token(),
            json!({"description": "T1 v3", "due_date": "2025-08-01", "status": "in_progress", "project_id": p1, "owner_id": null}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["owner_id"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn null_status_patch_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let owner = app.user("owner@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "Nulls").await?;
    let uri = format!("/api/tasks/{}", id_of(&task(&app, &admin, &p1, "T1", Some(&owner)).await?)?);

    let (status, _) = app.patch(&uri, owner.token(), json!({"status": null})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, current) = app.get(&uri, owner.token()).await?;
    assert_eq!(current["status"], "new");

    Ok(())
}

#[tokio::test]
async fn status_patch_on_hidden_task_is_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let reader = app.user("reader@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "Hidden").await?;
    let task_id = id_of(&task(&app, &admin, &p1, "someone else's", None).await?)?;

    let (status, _) = app
        .patch(&format!("/api/tasks/{task_id}"), reader.token(), json!({"status": "completed"}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn task_writes_validate_references() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.user("admin@example.com", &[ADMIN]).await?;
    let reader = app.user("reader@example.com", &[READ_ONLY]).await?;
    let p1 = project(&app, &admin, "Refs").await?;

    let (status, _) = app
        .post(
            "/api/tasks",
            Some(reader.token()),
            json!({"description": "x", "due_date": "2025-07-15", "status": "new", "project_id": p1}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/tasks",
            Some(admin.token()),
            json!({"description": "x", "due_date": "2025-07-15", "status": "new", "project_id": uuid::Uuid::new_v4()}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/tasks",
            Some(admin.token()),
            json!({"description": "x", "due_date": "2025-07-15", "status": "done", "project_id": p1}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let task_id = id_of(&task(&app, &admin, &p1, "owned", Some(&reader)).await?)?;
    let (status, cleared) = app
        .patch(&format!("/api/tasks/{task_id}"), admin.token(), json!({"owner_id": null}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["owner_id"], Value::Null);

    let (status, _) = app
        .patch(&format!("/api/tasks/{task_id}"), admin.token(), json!({"owner_id": uuid::Uuid::new_v4()}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn caller_without_recognised_role_is_denied() -> Result<()> {
    let app = TestApp::new().await?;
    let nobody = app.user("nobody@example.com", &[]).await?;

    let (status, _) = app.get("/api/tasks", nobody.token()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
