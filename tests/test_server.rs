//! In-process tests of the REST routes.

mod common;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{HeaderMap, Method, StatusCode, header};
use serde_json::{Value, json};
use taskboard::server::{self, AppState, router::{HandlerContext, Router}};

use common::*;

struct TestServer {
    router: Router,
    state: AppState,
    _temp_dir: tempfile::TempDir,
}

impl TestServer {
    async fn new(require_auth: bool) -> Self {
        let (db, temp_dir) = create_test_board().await;
        TaskBoard::new(db.clone())
            .seed_default_users()
            .await
            .expect("Failed to seed users");
        let state = AppState::new(db, require_auth);
        Self {
            router: server::build_router(&state),
            state,
            _temp_dir: temp_dir,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(header::AUTHORIZATION, format!("Bearer {}", token).parse()?);
        }
        let body = body
            .map(|b| Bytes::from(b.to_string()))
            .unwrap_or_default();
        let ctx = HandlerContext::new(method, path, headers, body);

        let response = server::respond(&self.router, &self.state, ctx).await;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, value))
    }
}

#[tokio::test]
async fn test_project_routes() -> anyhow::Result<()> {
    let server = TestServer::new(false).await;

    // 1. Create
    let (status, created) = server
        .call(
            Method::POST,
            "/projects",
            Some(json!({ "name": "Website", "description": "Relaunch" })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().expect("id in body");

    // 2. Read
    let (status, list) = server.call(Method::GET, "/projects", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, one) = server
        .call(Method::GET, &format!("/projects/{}", id), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["name"], "Website");

    // 3. Partial update
    let (status, updated) = server
        .call(
            Method::PUT,
            &format!("/projects/{}", id),
            Some(json!({ "name": "Intranet" })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Intranet");
    assert_eq!(updated["description"], "Relaunch");

    // 4. Delete, then it is gone
    let (status, _) = server
        .call(Method::DELETE, &format!("/projects/{}", id), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server
        .call(Method::GET, &format!("/projects/{}", id), None, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_nested_routes_and_wire_names() -> anyhow::Result<()> {
    let server = TestServer::new(false).await;
    let (_, project) = server
        .call(Method::POST, "/projects", Some(json!({ "name": "P" })), None)
        .await?;
    let project_id = project["id"].as_i64().expect("id");

    // 1. Scenario with camelCase fields
    let (status, scenario) = server
        .call(
            Method::POST,
            "/scenarios",
            Some(json!({ "name": "S", "priority": "high", "projectId": project_id })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(scenario["status"], "todo");
    assert_eq!(scenario["projectId"], project_id);
    let scenario_id = scenario["id"].as_i64().expect("id");

    // 2. Task under it
    let (status, task) = server
        .call(
            Method::POST,
            "/tasks",
            Some(json!({
                "name": "T",
                "priority": "low",
                "scenarioId": scenario_id,
                "estimatedTime": 1.5,
                "ownerId": 2
            })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["ownerId"], 2);
    assert_eq!(task["startDate"], Value::Null);
    assert!(task["creationDate"].is_string());

    // 3. Status change over PUT uses the wire spelling
    let task_id = task["id"].as_i64().expect("id");
    let (status, task) = server
        .call(
            Method::PUT,
            &format!("/tasks/{}", task_id),
            Some(json!({ "status": "in progress", "startDate": "2025-03-01T10:00:00Z" })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "in progress");
    assert!(task["startDate"].is_string());

    // 4. Nested listing and deletes
    let (_, tasks) = server
        .call(Method::GET, &format!("/scenarios/{}/tasks", scenario_id), None, None)
        .await?;
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));

    let (status, deleted) = server
        .call(Method::DELETE, &format!("/scenarios/{}/tasks", scenario_id), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 1);

    let (status, _) = server
        .call(Method::DELETE, &format!("/scenarios/{}/tasks", scenario_id), None, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, deleted) = server
        .call(Method::DELETE, &format!("/projects/{}/scenarios", project_id), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 1);

    Ok(())
}

#[tokio::test]
async fn test_bad_requests() -> anyhow::Result<()> {
    let server = TestServer::new(false).await;

    let (status, body) = server
        .call(Method::POST, "/projects", Some(json!({ "nope": true })), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = server.call(Method::GET, "/projects/abc", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .call(
            Method::POST,
            "/scenarios",
            Some(json!({ "name": "Orphan", "priority": "low", "projectId": 1 })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.call(Method::GET, "/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.call(Method::OPTIONS, "/projects", None, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn test_current_selection_routes() -> anyhow::Result<()> {
    let server = TestServer::new(false).await;

    let (status, body) = server
        .call(Method::GET, "/currentProjectId", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "currentProjectId": 0 }));

    let (status, _) = server
        .call(Method::POST, "/currentTaskId", Some(json!({ "id": 77 })), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.call(Method::GET, "/currentTaskId", None, None).await?;
    assert_eq!(body["currentTaskId"], 77);
    let (_, body) = server
        .call(Method::GET, "/currentScenarioId", None, None)
        .await?;
    assert_eq!(body["currentScenarioId"], 0);

    Ok(())
}

#[tokio::test]
async fn test_auth_routes_and_gate() -> anyhow::Result<()> {
    let server = TestServer::new(true).await;

    // 1. Public routes stay open
    let (status, _) = server.call(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);

    // 2. Data routes need a token
    let (status, _) = server.call(Method::GET, "/projects", None, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .call(Method::GET, "/projects", None, Some("not-a-jwt"))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 3. Bad login
    let (status, _) = server
        .call(
            Method::POST,
            "/login",
            Some(json!({ "username": "admin", "password": "wrong" })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 4. Good login opens the data routes
    let (status, tokens) = server
        .call(
            Method::POST,
            "/login",
            Some(json!({ "username": "admin", "password": "admin" })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["userId"], ADMIN_ID);
    let token = tokens["token"].as_str().expect("token").to_string();
    let refresh = tokens["refreshToken"].as_str().expect("refresh").to_string();

    let (status, _) = server
        .call(Method::GET, "/projects", None, Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK);

    // 5. Refresh token exchanges
    let (status, minted) = server
        .call(
            Method::POST,
            "/token",
            Some(json!({ "token": refresh, "exp": 30 })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(minted["token"].is_string());

    let (status, rotated) = server
        .call(
            Method::POST,
            "/refreshToken",
            Some(json!({ "refreshToken": refresh })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["refreshToken"].is_string());

    let (status, _) = server
        .call(
            Method::POST,
            "/refreshToken",
            Some(json!({ "refreshToken": refresh })),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 6. Saved tokens
    let (_, saved) = server
        .call(Method::GET, "/checkTokens", None, Some(&token))
        .await?;
    assert_eq!(saved, Value::Null);
    let (status, _) = server
        .call(
            Method::POST,
            "/saveTokens",
            Some(json!({ "token": token, "refreshToken": "r" })),
            Some(&token),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (_, saved) = server
        .call(Method::GET, "/checkTokens", None, Some(&token))
        .await?;
    assert_eq!(saved["refreshToken"], "r");

    Ok(())
}
