use std::{fmt, future::Future};

/// Entity kinds that have a persisted "current selection" pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    Project,
    Scenario,
    Task,
    User,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::Project => "project",
            SelectionKind::Scenario => "scenario",
            SelectionKind::Task => "task",
            SelectionKind::User => "user",
        }
    }

    /// JSON field used by the `/current<Kind>Id` endpoints.
    pub fn wire_field(&self) -> &'static str {
        match self {
            SelectionKind::Project => "currentProjectId",
            SelectionKind::Scenario => "currentScenarioId",
            SelectionKind::Task => "currentTaskId",
            SelectionKind::User => "currentUserId",
        }
    }

    pub fn route(&self) -> String {
        format!("/{}", self.wire_field())
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-valued "current" pointers; 0 means nothing is selected.
pub trait SelectionRepository {
    fn get_current_id(&self, kind: SelectionKind) -> impl Future<Output = anyhow::Result<i64>>;
    fn set_current_id(
        &self,
        kind: SelectionKind,
        id: i64,
    ) -> impl Future<Output = anyhow::Result<()>>;

    fn get_current_project_id(&self) -> impl Future<Output = anyhow::Result<i64>> {
        self.get_current_id(SelectionKind::Project)
    }

    fn set_current_project_id(&self, id: i64) -> impl Future<Output = anyhow::Result<()>> {
        self.set_current_id(SelectionKind::Project, id)
    }

    fn get_current_scenario_id(&self) -> impl Future<Output = anyhow::Result<i64>> {
        self.get_current_id(SelectionKind::Scenario)
    }

    fn set_current_scenario_id(&self, id: i64) -> impl Future<Output = anyhow::Result<()>> {
        self.set_current_id(SelectionKind::Scenario, id)
    }

    fn get_current_task_id(&self) -> impl Future<Output = anyhow::Result<i64>> {
        self.get_current_id(SelectionKind::Task)
    }

    fn set_current_task_id(&self, id: i64) -> impl Future<Output = anyhow::Result<()>> {
        self.set_current_id(SelectionKind::Task, id)
    }
}
