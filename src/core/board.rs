//! Board operations on top of any store: selection, cascading deletes and the
//! task workflow with its notifications.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    core::{
        db::{
            LoginTokens, NewProject, NewScenario, NewTask, NewUser, Priority, Project,
            ProjectUpdate, Scenario, ScenarioUpdate, SelectionKind, Status, Task, TaskUpdate,
            TrackerStore, User, default_users, now,
        },
        notify::{Notification, NotificationService},
        session::Session,
        workflow::{self, Rejection, StatusChange},
    },
    error::{BoardError, BoardResult},
};

/// Yes/no gate asked before an accepted status change is persisted.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Tasks of one scenario grouped by status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kanban {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl Kanban {
    pub fn column(&self, status: Status) -> &[Task] {
        match status {
            Status::Todo => &self.todo,
            Status::InProgress => &self.in_progress,
            Status::Done => &self.done,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (Status, &[Task])> {
        Status::ALL.into_iter().map(|status| (status, self.column(status)))
    }
}

impl FromIterator<Task> for Kanban {
    fn from_iter<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        let mut kanban = Kanban::default();
        for task in tasks {
            match task.status {
                Status::Todo => kanban.todo.push(task),
                Status::InProgress => kanban.in_progress.push(task),
                Status::Done => kanban.done.push(task),
            }
        }
        kanban
    }
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub projects: u64,
    pub scenarios: u64,
    pub tasks: u64,
}

#[derive(Debug, Clone)]
pub struct TaskBoard<S> {
    store: S,
    notifications: Arc<NotificationService>,
}

impl<S: TrackerStore> TaskBoard<S> {
    pub fn new(store: S) -> Self {
        Self::with_notifications(store, Arc::new(NotificationService::new()))
    }

    pub fn with_notifications(store: S, notifications: Arc<NotificationService>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifications(&self) -> &Arc<NotificationService> {
        &self.notifications
    }

    pub async fn session(&self) -> BoardResult<Session> {
        Ok(Session::load(&self.store).await?)
    }

    // ---- users ----

    pub async fn login(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> BoardResult<LoginTokens> {
        let tokens = self
            .store
            .login(username, password)
            .await?
            .ok_or(BoardError::InvalidCredentials)?;
        self.store
            .save_tokens(&tokens.token, &tokens.refresh_token)
            .await?;
        self.store
            .set_current_id(SelectionKind::User, tokens.user_id)
            .await?;
        session.set(SelectionKind::User, tokens.user_id);
        Ok(tokens)
    }

    pub async fn current_user(&self, session: &Session) -> BoardResult<User> {
        let id = session.require_user()?;
        self.user(id).await
    }

    pub async fn users(&self) -> BoardResult<Vec<User>> {
        Ok(self.store.get_users().await?)
    }

    pub async fn user(&self, id: i64) -> BoardResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or(BoardError::not_found("user", id))
    }

    pub async fn create_user(&self, user: &NewUser) -> BoardResult<User> {
        Ok(self.store.create_user(user).await?)
    }

    /// Create the default accounts when the board has none. Returns how many
    /// were added.
    pub async fn seed_default_users(&self) -> BoardResult<usize> {
        if !self.users().await?.is_empty() {
            return Ok(0);
        }
        let users = default_users();
        for user in &users {
            self.store.create_user(user).await?;
        }
        info!("Seeded {} default users", users.len());
        Ok(users.len())
    }

    /// Users that tasks can be given to.
    pub async fn assignable_users(&self) -> BoardResult<Vec<User>> {
        Ok(self
            .users()
            .await?
            .into_iter()
            .filter(|user| user.role.can_own_tasks())
            .collect())
    }

    // ---- projects ----

    pub async fn projects(&self) -> BoardResult<Vec<Project>> {
        Ok(self.store.get_projects().await?)
    }

    pub async fn project(&self, id: i64) -> BoardResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or(BoardError::not_found("project", id))
    }

    pub async fn create_project(&self, project: &NewProject) -> BoardResult<Project> {
        let project = self.store.create_project(project).await?;
        info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn update_project(&self, id: i64, update: &ProjectUpdate) -> BoardResult<Project> {
        self.store
            .update_project(id, update)
            .await?
            .ok_or(BoardError::not_found("project", id))
    }

    /// Delete a project with its scenarios and their tasks, children first.
    /// Not atomic: a failure part-way leaves the remaining rows in place.
    pub async fn delete_project(&self, id: i64) -> BoardResult<Removed> {
        self.project(id).await?;
        let mut removed = Removed::default();
        for scenario in self.store.get_scenarios_by_project_id(id).await? {
            removed.tasks += self.store.delete_tasks_by_scenario_id(scenario.id).await?;
        }
        removed.scenarios = self.store.delete_scenarios_by_project_id(id).await?;
        if self.store.delete_project(id).await? {
            removed.projects = 1;
        }
        info!(
            "Deleted project {} with {} scenarios and {} tasks",
            id, removed.scenarios, removed.tasks
        );
        Ok(removed)
    }

    pub async fn select_project(&self, session: &mut Session, id: i64) -> BoardResult<Project> {
        let project = self.project(id).await?;
        self.select(session, SelectionKind::Project, id).await?;
        self.select(session, SelectionKind::Scenario, 0).await?;
        self.select(session, SelectionKind::Task, 0).await?;
        Ok(project)
    }

    // ---- scenarios ----

    pub async fn scenarios(&self, project_id: i64) -> BoardResult<Vec<Scenario>> {
        Ok(self.store.get_scenarios_by_project_id(project_id).await?)
    }

    pub async fn scenario(&self, id: i64) -> BoardResult<Scenario> {
        self.store
            .get_scenario(id)
            .await?
            .ok_or(BoardError::not_found("scenario", id))
    }

    /// Create a scenario in the selected project.
    pub async fn create_scenario(
        &self,
        session: &Session,
        name: &str,
        description: &str,
        priority: Priority,
    ) -> BoardResult<Scenario> {
        let project_id = session.require(SelectionKind::Project)?;
        self.project(project_id).await?;
        let scenario = self
            .store
            .create_scenario(&NewScenario::new(project_id, name, description, priority))
            .await?;
        info!("Created scenario {} ({})", scenario.name, scenario.id);
        Ok(scenario)
    }

    pub async fn update_scenario(&self, id: i64, update: &ScenarioUpdate) -> BoardResult<Scenario> {
        self.store
            .update_scenario(id, update)
            .await?
            .ok_or(BoardError::not_found("scenario", id))
    }

    /// Delete a scenario and its tasks, tasks first.
    pub async fn delete_scenario(&self, id: i64) -> BoardResult<Removed> {
        self.scenario(id).await?;
        let mut removed = Removed {
            tasks: self.store.delete_tasks_by_scenario_id(id).await?,
            ..Removed::default()
        };
        if self.store.delete_scenario(id).await? {
            removed.scenarios = 1;
        }
        info!("Deleted scenario {} with {} tasks", id, removed.tasks);
        Ok(removed)
    }

    pub async fn select_scenario(&self, session: &mut Session, id: i64) -> BoardResult<Scenario> {
        let scenario = self.scenario(id).await?;
        self.select(session, SelectionKind::Scenario, id).await?;
        self.select(session, SelectionKind::Task, 0).await?;
        Ok(scenario)
    }

    // ---- tasks ----

    pub async fn tasks(&self, scenario_id: i64) -> BoardResult<Vec<Task>> {
        Ok(self.store.get_tasks_by_scenario_id(scenario_id).await?)
    }

    /// Tasks of a scenario, optionally limited to one status.
    pub async fn tasks_with_status(
        &self,
        scenario_id: i64,
        status: Option<Status>,
    ) -> BoardResult<Vec<Task>> {
        let mut tasks = self.tasks(scenario_id).await?;
        if let Some(status) = status {
            tasks.retain(|task| task.status == status);
        }
        Ok(tasks)
    }

    pub async fn kanban(&self, scenario_id: i64) -> BoardResult<Kanban> {
        Ok(self.tasks(scenario_id).await?.into_iter().collect())
    }

    pub async fn task(&self, id: i64) -> BoardResult<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or(BoardError::not_found("task", id))
    }

    /// Create a task in the selected scenario. A task created with an owner
    /// notifies that owner.
    pub async fn create_task(
        &self,
        session: &Session,
        name: &str,
        description: &str,
        priority: Priority,
        estimated_time: f64,
        owner_id: Option<i64>,
    ) -> BoardResult<Task> {
        let scenario_id = session.require(SelectionKind::Scenario)?;
        self.scenario(scenario_id).await?;
        if let Some(owner_id) = owner_id {
            self.owner(owner_id).await?;
        }

        let mut new_task = NewTask::new(scenario_id, name, description, priority, estimated_time);
        new_task.owner_id = owner_id;
        let task = self.store.create_task(&new_task).await?;
        info!("Created task {} ({})", task.name, task.id);
        if task.is_assigned() {
            self.notifications.send(Notification::task_assigned(&task));
        }
        Ok(task)
    }

    /// Edit the descriptive fields of a task. Status, owner and dates only
    /// change through [`Self::change_task_status`] and
    /// [`Self::assign_task_owner`].
    pub async fn update_task(&self, id: i64, update: &TaskUpdate) -> BoardResult<Task> {
        let update = TaskUpdate {
            scenario_id: update.scenario_id,
            name: update.name.clone(),
            description: update.description.clone(),
            priority: update.priority,
            estimated_time: update.estimated_time,
            ..TaskUpdate::default()
        };
        self.store
            .update_task(id, &update)
            .await?
            .ok_or(BoardError::not_found("task", id))
    }

    pub async fn delete_task(&self, id: i64) -> BoardResult<Removed> {
        if !self.store.delete_task(id).await? {
            return Err(BoardError::not_found("task", id));
        }
        Ok(Removed {
            tasks: 1,
            ..Removed::default()
        })
    }

    pub async fn select_task(&self, session: &mut Session, id: i64) -> BoardResult<Task> {
        let task = self.task(id).await?;
        self.select(session, SelectionKind::Task, id).await?;
        Ok(task)
    }

    /// Run a status change through the workflow, ask `confirm`, then persist
    /// and notify. Rejected and unchanged requests touch nothing.
    pub async fn change_task_status(
        &self,
        task_id: i64,
        status: Status,
        confirm: &impl Confirm,
    ) -> BoardResult<StatusChange> {
        let task = self.task(task_id).await?;
        let next = match workflow::attempt_status_change(&task, status, now()) {
            StatusChange::Accepted(next) => next,
            other => {
                debug!("Status change of task {} to {}: {:?}", task_id, status, other);
                return Ok(other);
            }
        };

        let prompt = format!(
            "Change status of task \"{}\" from {} to {}?",
            task.name, task.status, next.status
        );
        if !confirm.confirm(&prompt) {
            return Ok(StatusChange::Rejected {
                task,
                reason: Rejection::NotConfirmed,
            });
        }

        let update = TaskUpdate {
            status: Some(next.status),
            start_date: Some(next.start_date),
            end_date: Some(next.end_date),
            ..TaskUpdate::default()
        };
        let saved = self
            .store
            .update_task(task_id, &update)
            .await?
            .ok_or(BoardError::not_found("task", task_id))?;
        info!("Task {} is now {}", saved.id, saved.status);
        self.notifications
            .send(Notification::task_status_changed(&saved));
        Ok(StatusChange::Accepted(saved))
    }

    /// Give a task to `owner_id`; a `todo` task starts. Giving it to its
    /// current owner changes nothing.
    pub async fn assign_task_owner(&self, task_id: i64, owner_id: i64) -> BoardResult<Task> {
        let task = self.task(task_id).await?;
        self.owner(owner_id).await?;
        if task.owner_id == Some(owner_id) {
            debug!("Task {} already belongs to user {}", task_id, owner_id);
            return Ok(task);
        }
        let next = workflow::assign_owner(&task, owner_id, now());

        let update = TaskUpdate {
            owner_id: Some(next.owner_id),
            status: Some(next.status),
            start_date: Some(next.start_date),
            end_date: Some(next.end_date),
            ..TaskUpdate::default()
        };
        let saved = self
            .store
            .update_task(task_id, &update)
            .await?
            .ok_or(BoardError::not_found("task", task_id))?;
        info!("Task {} assigned to user {}", saved.id, owner_id);
        self.notifications.send(Notification::task_assigned(&saved));
        Ok(saved)
    }

    /// A user that tasks can be given to.
    async fn owner(&self, id: i64) -> BoardResult<User> {
        let user = self.user(id).await?;
        if !user.role.can_own_tasks() {
            return Err(BoardError::CannotOwnTasks {
                username: user.username,
                role: user.role,
            });
        }
        Ok(user)
    }

    async fn select(&self, session: &mut Session, kind: SelectionKind, id: i64) -> BoardResult<()> {
        self.store.set_current_id(kind, id).await?;
        session.set(kind, id);
        Ok(())
    }
}
