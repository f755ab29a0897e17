//! Board store that talks to a `taskboard serve` instance over HTTP.
//!
//! Reads never fail: transport errors and unexpected statuses are logged and
//! reported as an empty collection or an absent value. Writes return errors.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode, header};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, warn};

use crate::core::db::{
    AuthRepository, LoginTokens, NewProject, NewScenario, NewTask, NewUser, Project,
    ProjectRepository, ProjectUpdate, SavedTokens, Scenario, ScenarioRepository, ScenarioUpdate,
    SelectionKind, SelectionRepository, Task, TaskRepository, TaskUpdate, User, UserRepository,
    UserUpdate,
};

#[derive(Debug, Clone)]
pub struct RemoteDb {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
    bearer: Arc<RwLock<Option<String>>>,
}

struct Reply {
    status: StatusCode,
    body: Bytes,
}

impl Reply {
    fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_slice(&self.body).context("Malformed JSON in server reply")
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl RemoteDb {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::builder(TokioExecutor::new()).build_http(),
            bearer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `Authorization: Bearer <token>` with every following request.
    pub fn set_bearer(&self, token: Option<String>) {
        *self.bearer.write() = token;
    }

    /// Pick up the tokens stored on the server by an earlier `login`.
    pub async fn restore_bearer(&self) -> anyhow::Result<bool> {
        let reply = self.send(Method::GET, "/checkTokens", None).await?;
        if !reply.status.is_success() {
            return Ok(false);
        }
        let tokens: Option<SavedTokens> = reply.json()?;
        let found = tokens.is_some();
        self.set_bearer(tokens.map(|t| t.token));
        Ok(found)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<Reply> {
        let uri = format!("{}{}", self.base_url, path);
        let mut builder = Request::builder().method(method.clone()).uri(&uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let bearer = self.bearer.read().clone();
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Full::new(Bytes::from(body.unwrap_or_default())))?;

        let response = self
            .client
            .request(request)
            .await
            .with_context(|| format!("{} {} failed", method, uri))?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        debug!("{} {} -> {}", method, uri, status);
        Ok(Reply { status, body })
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> anyhow::Result<Reply> {
        self.send(method, path, Some(serde_json::to_vec(body)?)).await
    }

    /// GET a list; any failure yields an empty list.
    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Vec<T> {
        match self.fetch(path).await {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to fetch {}: {:#}", path, e);
                Vec::new()
            }
        }
    }

    /// GET a single document; any failure yields `None`.
    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.fetch(path).await {
            Ok(item) => item,
            Err(e) => {
                warn!("Failed to fetch {}: {:#}", path, e);
                None
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Option<T>> {
        let reply = self.send(Method::GET, path, None).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(reply.json()?)),
            status => Err(anyhow!("{} {}", status, reply.text())),
        }
    }

    async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let reply = self.send_json(Method::POST, path, body).await?;
        if !reply.status.is_success() {
            return Err(anyhow!("POST {} failed: {} {}", path, reply.status, reply.text()));
        }
        reply.json()
    }

    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<Option<T>> {
        let reply = self.send_json(Method::PUT, path, body).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(reply.json()?)),
            status => Err(anyhow!("PUT {} failed: {} {}", path, status, reply.text())),
        }
    }

    /// DELETE; `Ok(None)` when the server had nothing to delete.
    async fn delete(&self, path: &str) -> anyhow::Result<Option<Reply>> {
        let reply = self.send(Method::DELETE, path, None).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(reply)),
            status => Err(anyhow!("DELETE {} failed: {} {}", path, status, reply.text())),
        }
    }

    async fn delete_many(&self, path: &str) -> anyhow::Result<u64> {
        Ok(match self.delete(path).await? {
            Some(reply) => reply
                .json::<serde_json::Value>()?
                .get("deleted")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
            None => 0,
        })
    }
}

impl ProjectRepository for RemoteDb {
    async fn get_projects(&self) -> anyhow::Result<Vec<Project>> {
        Ok(self.fetch_list("/projects").await)
    }

    async fn get_project(&self, id: i64) -> anyhow::Result<Option<Project>> {
        Ok(self.fetch_one(&format!("/projects/{}", id)).await)
    }

    async fn create_project(&self, project: &NewProject) -> anyhow::Result<Project> {
        self.create("/projects", project).await
    }

    async fn update_project(
        &self,
        id: i64,
        update: &ProjectUpdate,
    ) -> anyhow::Result<Option<Project>> {
        self.update(&format!("/projects/{}", id), update).await
    }

    async fn delete_project(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.delete(&format!("/projects/{}", id)).await?.is_some())
    }
}

impl ScenarioRepository for RemoteDb {
    async fn get_scenarios(&self) -> anyhow::Result<Vec<Scenario>> {
        Ok(self.fetch_list("/scenarios").await)
    }

    async fn get_scenario(&self, id: i64) -> anyhow::Result<Option<Scenario>> {
        Ok(self.fetch_one(&format!("/scenarios/{}", id)).await)
    }

    async fn get_scenarios_by_project_id(&self, project_id: i64) -> anyhow::Result<Vec<Scenario>> {
        Ok(self
            .fetch_list(&format!("/projects/{}/scenarios", project_id))
            .await)
    }

    async fn create_scenario(&self, scenario: &NewScenario) -> anyhow::Result<Scenario> {
        self.create("/scenarios", scenario).await
    }

    async fn update_scenario(
        &self,
        id: i64,
        update: &ScenarioUpdate,
    ) -> anyhow::Result<Option<Scenario>> {
        self.update(&format!("/scenarios/{}", id), update).await
    }

    async fn delete_scenario(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.delete(&format!("/scenarios/{}", id)).await?.is_some())
    }

    async fn delete_scenarios_by_project_id(&self, project_id: i64) -> anyhow::Result<u64> {
        self.delete_many(&format!("/projects/{}/scenarios", project_id))
            .await
    }
}

impl TaskRepository for RemoteDb {
    async fn get_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.fetch_list("/tasks").await)
    }

    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>> {
        Ok(self.fetch_one(&format!("/tasks/{}", id)).await)
    }

    async fn get_tasks_by_scenario_id(&self, scenario_id: i64) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .fetch_list(&format!("/scenarios/{}/tasks", scenario_id))
            .await)
    }

    async fn create_task(&self, task: &NewTask) -> anyhow::Result<Task> {
        self.create("/tasks", task).await
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> anyhow::Result<Option<Task>> {
        self.update(&format!("/tasks/{}", id), update).await
    }

    async fn delete_task(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.delete(&format!("/tasks/{}", id)).await?.is_some())
    }

    async fn delete_tasks_by_scenario_id(&self, scenario_id: i64) -> anyhow::Result<u64> {
        self.delete_many(&format!("/scenarios/{}/tasks", scenario_id))
            .await
    }
}

impl UserRepository for RemoteDb {
    async fn get_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.fetch_list("/users").await)
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.fetch_one(&format!("/users/{}", id)).await)
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User> {
        self.create("/users", user).await
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> anyhow::Result<Option<User>> {
        self.update(&format!("/users/{}", id), update).await
    }

    async fn delete_user(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.delete(&format!("/users/{}", id)).await?.is_some())
    }
}

impl SelectionRepository for RemoteDb {
    async fn get_current_id(&self, kind: SelectionKind) -> anyhow::Result<i64> {
        let doc: Option<serde_json::Value> = self.fetch_one(&kind.route()).await;
        Ok(doc
            .and_then(|doc| doc.get(kind.wire_field()).and_then(serde_json::Value::as_i64))
            .unwrap_or(0))
    }

    async fn set_current_id(&self, kind: SelectionKind, id: i64) -> anyhow::Result<()> {
        let reply = self
            .send_json(Method::POST, &kind.route(), &json!({ "id": id }))
            .await?;
        if !reply.status.is_success() {
            return Err(anyhow!(
                "Failed to set current {} id: {} {}",
                kind,
                reply.status,
                reply.text()
            ));
        }
        Ok(())
    }
}

impl AuthRepository for RemoteDb {
    async fn are_tokens_present(&self) -> anyhow::Result<bool> {
        let tokens: Option<Option<SavedTokens>> = self.fetch_one("/checkTokens").await;
        Ok(tokens
            .flatten()
            .is_some_and(|t| !t.token.is_empty() && !t.refresh_token.is_empty()))
    }

    async fn save_tokens(&self, token: &str, refresh_token: &str) -> anyhow::Result<()> {
        let body = SavedTokens {
            token: token.to_string(),
            refresh_token: refresh_token.to_string(),
        };
        self.set_bearer(Some(token.to_string()));
        let reply = self.send_json(Method::POST, "/saveTokens", &body).await?;
        if !reply.status.is_success() {
            return Err(anyhow!("Failed to save tokens: {} {}", reply.status, reply.text()));
        }
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Option<LoginTokens>> {
        let reply = self
            .send_json(
                Method::POST,
                "/login",
                &json!({ "username": username, "password": password }),
            )
            .await?;
        match reply.status {
            StatusCode::UNAUTHORIZED => Ok(None),
            status if status.is_success() => Ok(Some(reply.json()?)),
            status => Err(anyhow!("Login failed: {} {}", status, reply.text())),
        }
    }
}
