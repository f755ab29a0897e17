use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{
    AppState,
    response::{ApiError, ApiResult, json_response, text_response},
    router::HandlerContext,
};
use crate::core::db::{
    AuthRepository, NewProject, NewScenario, NewTask, NewUser, ProjectRepository, ProjectUpdate,
    SavedTokens, ScenarioRepository, ScenarioUpdate, SelectionKind, SelectionRepository,
    TaskRepository, TaskUpdate, UserRepository, UserUpdate,
};

fn ok<T: serde::Serialize + ?Sized>(value: &T) -> ApiResult {
    Ok(json_response(StatusCode::OK, value))
}

fn created<T: serde::Serialize + ?Sized>(value: &T) -> ApiResult {
    Ok(json_response(StatusCode::CREATED, value))
}

fn found<T: serde::Serialize>(value: Option<T>, kind: &str, id: i64) -> ApiResult {
    match value {
        Some(value) => ok(&value),
        None => Err(ApiError::NotFound(format!("{} {} not found", kind, id))),
    }
}

fn deleted(count: u64, kind: &str, id: i64) -> ApiResult {
    if count == 0 {
        return Err(ApiError::NotFound(format!("{} {} not found", kind, id)));
    }
    ok(&json!({ "deleted": count }))
}

pub async fn banner(_ctx: HandlerContext, _state: AppState) -> ApiResult {
    Ok(text_response(StatusCode::OK, "taskboard API"))
}

// ---- auth ----

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct TokenRequest {
    token: String,
    /// Lifetime of the new access token in seconds.
    exp: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

pub async fn login(ctx: HandlerContext, state: AppState) -> ApiResult {
    let request: LoginRequest = ctx.json()?;
    match state.db.login(&request.username, &request.password).await? {
        Some(tokens) => ok(&tokens),
        None => Err(ApiError::Unauthorized(
            "Invalid username or password".to_string(),
        )),
    }
}

pub async fn token(ctx: HandlerContext, state: AppState) -> ApiResult {
    let request: TokenRequest = ctx.json()?;
    if request.token.is_empty() {
        return Err(ApiError::Unauthorized("Refresh token required".to_string()));
    }
    match state.db.issue_access_token(&request.token, request.exp).await? {
        Some(token) => ok(&json!({ "token": token })),
        None => Err(ApiError::Forbidden("Unknown refresh token".to_string())),
    }
}

pub async fn refresh_token(ctx: HandlerContext, state: AppState) -> ApiResult {
    let request: RefreshRequest = ctx.json()?;
    match state.db.rotate_refresh_token(&request.refresh_token).await? {
        Some(tokens) => ok(&tokens),
        None => Err(ApiError::Forbidden("Unknown refresh token".to_string())),
    }
}

pub async fn save_tokens(ctx: HandlerContext, state: AppState) -> ApiResult {
    let tokens: SavedTokens = ctx.json()?;
    state
        .db
        .save_tokens(&tokens.token, &tokens.refresh_token)
        .await?;
    ok(&tokens)
}

pub async fn check_tokens(_ctx: HandlerContext, state: AppState) -> ApiResult {
    ok(&state.db.get_saved_tokens().await?)
}

// ---- users ----

pub async fn list_users(_ctx: HandlerContext, state: AppState) -> ApiResult {
    ok(&state.db.get_users().await?)
}

pub async fn get_user(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    found(state.db.get_user(id).await?, "user", id)
}

pub async fn create_user(ctx: HandlerContext, state: AppState) -> ApiResult {
    let user: NewUser = ctx.json()?;
    let user = state.db.create_user(&user).await?;
    info!("Created user {} ({})", user.username, user.id);
    created(&user)
}

pub async fn update_user(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let update: UserUpdate = ctx.json()?;
    found(state.db.update_user(id, &update).await?, "user", id)
}

pub async fn delete_user(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    deleted(state.db.delete_user(id).await?.into(), "user", id)
}

// ---- projects ----

pub async fn list_projects(_ctx: HandlerContext, state: AppState) -> ApiResult {
    ok(&state.db.get_projects().await?)
}

pub async fn get_project(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    found(state.db.get_project(id).await?, "project", id)
}

pub async fn create_project(ctx: HandlerContext, state: AppState) -> ApiResult {
    let project: NewProject = ctx.json()?;
    created(&state.db.create_project(&project).await?)
}

pub async fn update_project(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let update: ProjectUpdate = ctx.json()?;
    found(state.db.update_project(id, &update).await?, "project", id)
}

pub async fn delete_project(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    deleted(state.db.delete_project(id).await?.into(), "project", id)
}

pub async fn list_project_scenarios(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    ok(&state.db.get_scenarios_by_project_id(id).await?)
}

pub async fn delete_project_scenarios(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let count = state.db.delete_scenarios_by_project_id(id).await?;
    debug!("Deleted {} scenarios of project {}", count, id);
    deleted(count, "scenarios of project", id)
}

// ---- scenarios ----

pub async fn list_scenarios(_ctx: HandlerContext, state: AppState) -> ApiResult {
    ok(&state.db.get_scenarios().await?)
}

pub async fn get_scenario(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    found(state.db.get_scenario(id).await?, "scenario", id)
}

pub async fn create_scenario(ctx: HandlerContext, state: AppState) -> ApiResult {
    let scenario: NewScenario = ctx.json()?;
    if state.db.get_project(scenario.project_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "project {} does not exist",
            scenario.project_id
        )));
    }
    created(&state.db.create_scenario(&scenario).await?)
}

pub async fn update_scenario(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let update: ScenarioUpdate = ctx.json()?;
    found(state.db.update_scenario(id, &update).await?, "scenario", id)
}

pub async fn delete_scenario(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    deleted(state.db.delete_scenario(id).await?.into(), "scenario", id)
}

pub async fn list_scenario_tasks(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    ok(&state.db.get_tasks_by_scenario_id(id).await?)
}

pub async fn delete_scenario_tasks(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let count = state.db.delete_tasks_by_scenario_id(id).await?;
    debug!("Deleted {} tasks of scenario {}", count, id);
    deleted(count, "tasks of scenario", id)
}

// ---- tasks ----

pub async fn list_tasks(_ctx: HandlerContext, state: AppState) -> ApiResult {
    ok(&state.db.get_tasks().await?)
}

pub async fn get_task(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    found(state.db.get_task(id).await?, "task", id)
}

pub async fn create_task(ctx: HandlerContext, state: AppState) -> ApiResult {
    let task: NewTask = ctx.json()?;
    if state.db.get_scenario(task.scenario_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "scenario {} does not exist",
            task.scenario_id
        )));
    }
    created(&state.db.create_task(&task).await?)
}

pub async fn update_task(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    let update: TaskUpdate = ctx.json()?;
    found(state.db.update_task(id, &update).await?, "task", id)
}

pub async fn delete_task(ctx: HandlerContext, state: AppState) -> ApiResult {
    let id = ctx.id_param("id")?;
    deleted(state.db.delete_task(id).await?.into(), "task", id)
}

// ---- current selection ----

#[derive(Deserialize)]
struct SelectRequest {
    id: i64,
}

pub async fn get_current(kind: SelectionKind, state: AppState) -> ApiResult {
    let id = state.db.get_current_id(kind).await?;
    ok(&json!({ kind.wire_field(): id }))
}

pub async fn set_current(kind: SelectionKind, ctx: HandlerContext, state: AppState) -> ApiResult {
    let request: SelectRequest = ctx.json()?;
    state.db.set_current_id(kind, request.id).await?;
    ok(&json!({ kind.wire_field(): request.id }))
}
