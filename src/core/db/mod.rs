mod auth;
mod model;
mod project;
mod scenario;
mod selection;
mod state;
mod task;
mod user;

use std::{path::Path, sync::Arc};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::auth::{ACCESS_TOKEN_SECS, TokenKeys, TokenUser, hash_password, verify_password};
use state::BoardState;

pub use auth::{AuthRepository, LoginTokens, SavedTokens};
pub use model::{Priority, Role, Status, next_id, now};
pub use project::{NewProject, Project, ProjectRepository, ProjectUpdate};
pub use scenario::{NewScenario, Scenario, ScenarioRepository, ScenarioUpdate};
pub use selection::{SelectionKind, SelectionRepository};
pub use task::{NewTask, Task, TaskRepository, TaskUpdate};
pub use user::{NewUser, User, UserRepository, UserUpdate, default_users};

/// Everything a board backend has to provide.
pub trait TrackerStore:
    ProjectRepository
    + ScenarioRepository
    + TaskRepository
    + UserRepository
    + SelectionRepository
    + AuthRepository
{
}

impl<T> TrackerStore for T where
    T: ProjectRepository
        + ScenarioRepository
        + TaskRepository
        + UserRepository
        + SelectionRepository
        + AuthRepository
{
}

/// Local board backed by an archived SQLite database.
#[derive(Debug, Clone)]
pub struct BoardDb {
    state: Arc<BoardState>,
    keys: TokenKeys,
}

impl BoardDb {
    pub async fn open<P: AsRef<Path>>(board_file: P, keys: TokenKeys) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(BoardState::open(board_file).await?),
            keys,
        })
    }

    /// Explicitly save the board to disk.
    /// This is required when dropping in an async context (e.g., tests with #[tokio::test]).
    pub async fn save(&self) -> anyhow::Result<()> {
        self.state.save().await
    }

    pub fn board_file(&self) -> &Path {
        self.state.board_file()
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Exchange a recorded refresh token for a new access token.
    pub async fn issue_access_token(
        &self,
        refresh_token: &str,
        expires_in_secs: Option<i64>,
    ) -> anyhow::Result<Option<String>> {
        if !self.is_refresh_token_known(refresh_token).await? {
            return Ok(None);
        }
        let Ok(user) = self.keys.verify_refresh_token(refresh_token) else {
            return Ok(None);
        };
        let token = self
            .keys
            .issue_token(&user, expires_in_secs.unwrap_or(ACCESS_TOKEN_SECS))?;
        Ok(Some(token))
    }

    /// Replace a recorded refresh token with a fresh access/refresh pair.
    pub async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
    ) -> anyhow::Result<Option<SavedTokens>> {
        if !self.is_refresh_token_known(refresh_token).await? {
            return Ok(None);
        }
        let Ok(user) = self.keys.verify_refresh_token(refresh_token) else {
            return Ok(None);
        };
        let token = self.keys.issue_token(&user, ACCESS_TOKEN_SECS)?;
        let new_refresh = self.keys.issue_refresh_token(&user)?;

        let mut conn = self.state.conn().await?;
        sqlx::query(r#"DELETE FROM refresh_token WHERE token = $1"#)
            .bind(refresh_token)
            .execute(&mut **conn)
            .await?;
        sqlx::query(r#"INSERT INTO refresh_token (token) VALUES ($1)"#)
            .bind(&new_refresh)
            .execute(&mut **conn)
            .await?;
        Ok(Some(SavedTokens {
            token,
            refresh_token: new_refresh,
        }))
    }

    /// Tokens last stored through `save_tokens`.
    pub async fn get_saved_tokens(&self) -> anyhow::Result<Option<SavedTokens>> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, (String, String)>(
            r#"SELECT token, refresh_token FROM saved_tokens WHERE slot = 0"#,
        )
        .fetch_optional(&mut **conn)
        .await?
        .map(|(token, refresh_token)| SavedTokens {
            token,
            refresh_token,
        }))
    }

    async fn is_refresh_token_known(&self, refresh_token: &str) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        Ok(
            sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM refresh_token WHERE token = $1"#)
                .bind(refresh_token)
                .fetch_one(&mut **conn)
                .await?
                > 0,
        )
    }
}

#[derive(sqlx::FromRow)]
struct ScenarioRecord {
    id: i64,
    project_id: i64,
    name: String,
    description: String,
    priority: i64,
    status: i64,
    owner_id: Option<i64>,
    creation_date: OffsetDateTime,
}

impl TryFrom<ScenarioRecord> for Scenario {
    type Error = anyhow::Error;

    fn try_from(record: ScenarioRecord) -> Result<Self, Self::Error> {
        Ok(Scenario {
            id: record.id,
            name: record.name,
            description: record.description,
            priority: Priority::try_from(record.priority)?,
            project_id: record.project_id,
            creation_date: record.creation_date,
            status: Status::try_from(record.status)?,
            owner_id: record.owner_id,
            _guard: (),
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRecord {
    id: i64,
    scenario_id: i64,
    owner_id: Option<i64>,
    name: String,
    description: String,
    priority: i64,
    status: i64,
    estimated_time: f64,
    creation_date: OffsetDateTime,
    start_date: Option<OffsetDateTime>,
    end_date: Option<OffsetDateTime>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = anyhow::Error;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        Ok(Task {
            id: record.id,
            scenario_id: record.scenario_id,
            owner_id: record.owner_id,
            name: record.name,
            description: record.description,
            priority: Priority::try_from(record.priority)?,
            status: Status::try_from(record.status)?,
            estimated_time: record.estimated_time,
            creation_date: record.creation_date,
            start_date: record.start_date,
            end_date: record.end_date,
            _guard: (),
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    name: String,
    surname: String,
    role: i64,
}

impl TryFrom<UserRecord> for User {
    type Error = anyhow::Error;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            id: record.id,
            username: record.username,
            name: record.name,
            surname: record.surname,
            role: Role::try_from(record.role)?,
            _guard: (),
        })
    }
}

const SCENARIO_COLUMNS: &str =
    "id, project_id, name, description, priority, status, owner_id, creation_date";
const TASK_COLUMNS: &str = "id, scenario_id, owner_id, name, description, priority, status, \
    estimated_time, creation_date, start_date, end_date";
const USER_COLUMNS: &str = "id, username, name, surname, role";

impl ProjectRepository for BoardDb {
    async fn get_projects(&self) -> anyhow::Result<Vec<Project>> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, (i64, String, String)>(
            r#"SELECT id, name, description FROM project ORDER BY id ASC"#,
        )
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(|(id, name, description)| Project {
            id,
            name,
            description,
            _guard: (),
        })
        .collect())
    }

    async fn get_project(&self, id: i64) -> anyhow::Result<Option<Project>> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, (i64, String, String)>(
            r#"SELECT id, name, description FROM project WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(|(id, name, description)| Project {
            id,
            name,
            description,
            _guard: (),
        }))
    }

    async fn create_project(&self, project: &NewProject) -> anyhow::Result<Project> {
        let mut conn = self.state.conn().await?;
        let (id, name, description) = sqlx::query_as::<_, (i64, String, String)>(
            r#"INSERT INTO project (id, name, description) VALUES ($1, $2, $3)
            RETURNING id, name, description"#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .fetch_one(&mut **conn)
        .await?;
        debug!("Created project {}", id);
        Ok(Project {
            id,
            name,
            description,
            _guard: (),
        })
    }

    async fn update_project(
        &self,
        id: i64,
        update: &ProjectUpdate,
    ) -> anyhow::Result<Option<Project>> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, (i64, String, String)>(
            r#"UPDATE project SET
                name = COALESCE($1, name),
                description = COALESCE($2, description)
            WHERE id = $3
            RETURNING id, name, description"#,
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(|(id, name, description)| Project {
            id,
            name,
            description,
            _guard: (),
        }))
    }

    async fn delete_project(&self, id: i64) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM project WHERE id = $1"#)
            .bind(id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl ScenarioRepository for BoardDb {
    async fn get_scenarios(&self) -> anyhow::Result<Vec<Scenario>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ScenarioRecord>(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM scenario ORDER BY id ASC"
        ))
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Scenario::try_from)
        .collect()
    }

    async fn get_scenario(&self, id: i64) -> anyhow::Result<Option<Scenario>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ScenarioRecord>(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM scenario WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(Scenario::try_from)
        .transpose()
    }

    async fn get_scenarios_by_project_id(&self, project_id: i64) -> anyhow::Result<Vec<Scenario>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ScenarioRecord>(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM scenario WHERE project_id = $1 ORDER BY id ASC"
        ))
        .bind(project_id)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Scenario::try_from)
        .collect()
    }

    async fn create_scenario(&self, scenario: &NewScenario) -> anyhow::Result<Scenario> {
        let mut conn = self.state.conn().await?;
        let record = sqlx::query_as::<_, ScenarioRecord>(&format!(
            "INSERT INTO scenario ({SCENARIO_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SCENARIO_COLUMNS}"
        ))
        .bind(scenario.id)
        .bind(scenario.project_id)
        .bind(&scenario.name)
        .bind(&scenario.description)
        .bind(i64::from(scenario.priority))
        .bind(i64::from(scenario.status))
        .bind(scenario.owner_id)
        .bind(scenario.creation_date)
        .fetch_one(&mut **conn)
        .await?;
        debug!("Created scenario {} in project {}", record.id, record.project_id);
        Scenario::try_from(record)
    }

    async fn update_scenario(
        &self,
        id: i64,
        update: &ScenarioUpdate,
    ) -> anyhow::Result<Option<Scenario>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ScenarioRecord>(&format!(
            "UPDATE scenario SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                priority = COALESCE($3, priority),
                status = COALESCE($4, status),
                owner_id = CASE WHEN $5 THEN $6 ELSE owner_id END
            WHERE id = $7
            RETURNING {SCENARIO_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.priority.map(i64::from))
        .bind(update.status.map(i64::from))
        .bind(update.owner_id.is_some())
        .bind(update.owner_id.flatten())
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(Scenario::try_from)
        .transpose()
    }

    async fn delete_scenario(&self, id: i64) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM scenario WHERE id = $1"#)
            .bind(id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_scenarios_by_project_id(&self, project_id: i64) -> anyhow::Result<u64> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM scenario WHERE project_id = $1"#)
            .bind(project_id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TaskRepository for BoardDb {
    async fn get_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskRecord>(&format!("SELECT {TASK_COLUMNS} FROM task ORDER BY id ASC"))
            .fetch_all(&mut **conn)
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskRecord>(&format!("SELECT {TASK_COLUMNS} FROM task WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn get_tasks_by_scenario_id(&self, scenario_id: i64) -> anyhow::Result<Vec<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE scenario_id = $1 ORDER BY id ASC"
        ))
        .bind(scenario_id)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Task::try_from)
        .collect()
    }

    async fn create_task(&self, task: &NewTask) -> anyhow::Result<Task> {
        let mut conn = self.state.conn().await?;
        let record = sqlx::query_as::<_, TaskRecord>(&format!(
            "INSERT INTO task ({TASK_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, NULL)
            RETURNING {TASK_COLUMNS}"
        ))
        .bind(task.id)
        .bind(task.scenario_id)
        .bind(task.owner_id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(i64::from(task.priority))
        .bind(i64::from(Status::Todo))
        .bind(task.estimated_time)
        .bind(task.creation_date)
        .fetch_one(&mut **conn)
        .await?;
        debug!("Created task {} in scenario {}", record.id, record.scenario_id);
        Task::try_from(record)
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> anyhow::Result<Option<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskRecord>(&format!(
            "UPDATE task SET
                scenario_id = COALESCE($1, scenario_id),
                owner_id = CASE WHEN $2 THEN $3 ELSE owner_id END,
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                priority = COALESCE($6, priority),
                status = COALESCE($7, status),
                estimated_time = COALESCE($8, estimated_time),
                start_date = CASE WHEN $9 THEN $10 ELSE start_date END,
                end_date = CASE WHEN $11 THEN $12 ELSE end_date END
            WHERE id = $13
            RETURNING {TASK_COLUMNS}"
        ))
        .bind(update.scenario_id)
        .bind(update.owner_id.is_some())
        .bind(update.owner_id.flatten())
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.priority.map(i64::from))
        .bind(update.status.map(i64::from))
        .bind(update.estimated_time)
        .bind(update.start_date.is_some())
        .bind(update.start_date.flatten())
        .bind(update.end_date.is_some())
        .bind(update.end_date.flatten())
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(Task::try_from)
        .transpose()
    }

    async fn delete_task(&self, id: i64) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM task WHERE id = $1"#)
            .bind(id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_tasks_by_scenario_id(&self, scenario_id: i64) -> anyhow::Result<u64> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM task WHERE scenario_id = $1"#)
            .bind(scenario_id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl UserRepository for BoardDb {
    async fn get_users(&self) -> anyhow::Result<Vec<User>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM user ORDER BY id ASC"))
            .fetch_all(&mut **conn)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User> {
        let mut conn = self.state.conn().await?;
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO user (id, username, name, surname, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(i64::from(user.role))
        .bind(hash_password(&user.password))
        .fetch_one(&mut **conn)
        .await?;
        User::try_from(record)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        let password_hash = update.password.as_deref().map(hash_password);
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE user SET
                name = COALESCE($1, name),
                surname = COALESCE($2, surname),
                role = COALESCE($3, role),
                password_hash = COALESCE($4, password_hash)
            WHERE id = $5
            RETURNING {USER_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.surname)
        .bind(update.role.map(i64::from))
        .bind(password_hash)
        .bind(id)
        .fetch_optional(&mut **conn)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn delete_user(&self, id: i64) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(r#"DELETE FROM user WHERE id = $1"#)
            .bind(id)
            .execute(&mut **conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl SelectionRepository for BoardDb {
    async fn get_current_id(&self, kind: SelectionKind) -> anyhow::Result<i64> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT current_id FROM current_selection WHERE kind = $1"#,
        )
        .bind(kind.as_str())
        .fetch_optional(&mut **conn)
        .await?
        .unwrap_or(0))
    }

    async fn set_current_id(&self, kind: SelectionKind, id: i64) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"INSERT INTO current_selection (kind, current_id) VALUES ($1, $2)
            ON CONFLICT (kind) DO UPDATE SET current_id = EXCLUDED.current_id"#,
        )
        .bind(kind.as_str())
        .bind(id)
        .execute(&mut **conn)
        .await?;
        debug!("Current {} set to {}", kind, id);
        Ok(())
    }
}

impl AuthRepository for BoardDb {
    async fn are_tokens_present(&self) -> anyhow::Result<bool> {
        Ok(self
            .get_saved_tokens()
            .await?
            .is_some_and(|tokens| !tokens.token.is_empty() && !tokens.refresh_token.is_empty()))
    }

    async fn save_tokens(&self, token: &str, refresh_token: &str) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"INSERT INTO saved_tokens (slot, token, refresh_token) VALUES (0, $1, $2)
            ON CONFLICT (slot) DO UPDATE SET
                token = EXCLUDED.token,
                refresh_token = EXCLUDED.refresh_token"#,
        )
        .bind(token)
        .bind(refresh_token)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Option<LoginTokens>> {
        let mut conn = self.state.conn().await?;
        let Some((id, role, password_hash)) = sqlx::query_as::<_, (i64, i64, String)>(
            r#"SELECT id, role, password_hash FROM user WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&mut **conn)
        .await?
        else {
            warn!("Login attempt for unknown user {}", username);
            return Ok(None);
        };
        if !verify_password(&password_hash, password) {
            warn!("Wrong password for user {}", username);
            return Ok(None);
        }

        let user = TokenUser {
            username: username.to_string(),
            role: Role::try_from(role)?,
            user_id: id,
        };
        let token = self.keys.issue_token(&user, ACCESS_TOKEN_SECS)?;
        let refresh_token = self.keys.issue_refresh_token(&user)?;
        sqlx::query(r#"INSERT INTO refresh_token (token) VALUES ($1)"#)
            .bind(&refresh_token)
            .execute(&mut **conn)
            .await?;
        info!("User {} logged in", username);
        Ok(Some(LoginTokens {
            token,
            refresh_token,
            user_id: id,
        }))
    }
}
